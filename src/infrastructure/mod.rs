pub mod container_engine;
pub mod docker_cli;
pub mod shutdown;

pub use container_engine::{
    ContainerEngine, ContainerEvents, ContainerInvocation, EnvVar, OutputLine, OutputStream,
    VolumeMount,
};
pub use docker_cli::DockerCli;
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
