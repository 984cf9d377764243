/// A container to run: the image, its entrypoint and the entrypoint's arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
}

impl ContainerSpec {
    pub fn new<C, A>(image: impl Into<String>, command: C, args: A) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            image: image.into(),
            command: command.into_iter().map(Into::into).collect(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named step of a pipeline that runs one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub container: ContainerSpec,
}

/// A graph of tasks. Tasks have no dependencies between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Adds a task running `container` to the pipeline.
    pub fn task(mut self, name: impl Into<String>, container: ContainerSpec) -> Self {
        self.tasks.push(Task {
            name: name.into(),
            container,
        });
        self
    }
}
