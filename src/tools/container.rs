// ABOUTME: Container engine CLI calls for building and moving images.
// ABOUTME: Wraps docker build, tag, push, and pull with the build timeout.

use super::Toolchain;
use crate::config::ArtifactConfig;
use crate::exec::{CommandOutput, CommandSpec, ExecError};
use crate::types::ImageRef;

pub struct ContainerEngine<'a> {
    tc: Toolchain<'a>,
}

impl<'a> ContainerEngine<'a> {
    pub fn new(tc: Toolchain<'a>) -> Self {
        Self { tc }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.tc.config().tools.container)
            .timeout(self.tc.config().timeouts.build)
    }

    pub async fn build(
        &self,
        artifact: &ArtifactConfig,
        image: &ImageRef,
    ) -> Result<CommandOutput, ExecError> {
        let dockerfile = self.tc.path(&artifact.dockerfile);
        let context = self.tc.path(&artifact.context);
        self.tc
            .run(
                self.command()
                    .arg("build")
                    .arg("-f")
                    .arg(dockerfile.display().to_string())
                    .arg("-t")
                    .arg(image.to_string())
                    .arg(context.display().to_string()),
            )
            .await
    }

    pub async fn tag(
        &self,
        source: &ImageRef,
        target: &ImageRef,
    ) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(
                self.command()
                    .arg("tag")
                    .arg(source.to_string())
                    .arg(target.to_string()),
            )
            .await
    }

    pub async fn push(&self, image: &ImageRef) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command().arg("push").arg(image.to_string()))
            .await
    }

    pub async fn pull(&self, image: &ImageRef) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command().arg("pull").arg(image.to_string()))
            .await
    }
}
