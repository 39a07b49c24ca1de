use crate::config::{Config, RunImageConfig};

impl Config {
    /// Keeps the legacy `[stack]` table and the `[build]`/`[[run.images]]` tables in sync.
    ///
    /// `build.image` wins over `stack.build-image`; a lone `stack.build-image` is copied to
    /// `build.image`. The first run image is the canonical one for `stack.run-image` and
    /// `stack.run-image-mirrors`; without any run images, a lone `stack.run-image` becomes the
    /// only run image.
    ///
    /// Conflicting values are not reported here, see [`validate_config`].
    pub fn merge_stack_with_images(&mut self) {
        if !self.build.image.is_empty() {
            self.stack.build_image.clone_from(&self.build.image);
        } else if !self.stack.build_image.is_empty() {
            self.build.image.clone_from(&self.stack.build_image);
        }

        if let Some(run_image) = self.run.images.first() {
            self.stack.run_image.clone_from(&run_image.image);
            self.stack.run_image_mirrors.clone_from(&run_image.mirrors);
        } else if !self.stack.run_image.is_empty() {
            self.run.images = vec![RunImageConfig {
                image: self.stack.run_image.clone(),
                mirrors: self.stack.run_image_mirrors.clone(),
            }];
        }
    }
}

/// Validates the build and run image configuration of a builder.
///
/// # Errors
///
/// Will return `Err` if no build image is configured, if `build.image` and `stack.build-image`
/// conflict, if no run image is configured, if a run image has no image reference, or if
/// `stack.run-image` is not the first run image.
pub fn validate_config(config: &Config) -> Result<(), ValidateConfigError> {
    let build_image = &config.build.image;
    let stack = &config.stack;

    if build_image.is_empty() && stack.build_image.is_empty() {
        return Err(ValidateConfigError::BuildImageRequired);
    } else if !build_image.is_empty()
        && !stack.build_image.is_empty()
        && build_image != &stack.build_image
    {
        return Err(ValidateConfigError::BuildImageMismatch {
            build_image: build_image.clone(),
            stack_build_image: stack.build_image.clone(),
        });
    }

    if config.run.images.is_empty() && (stack.run_image.is_empty() || stack.id.is_empty()) {
        return Err(ValidateConfigError::RunImagesRequired);
    }

    if config.run.images.iter().any(|run_image| run_image.image.is_empty()) {
        return Err(ValidateConfigError::RunImageRequired);
    }

    if !stack.run_image.is_empty() {
        let first_run_image = config.run.images.first().map(|run_image| &run_image.image);

        if first_run_image != Some(&stack.run_image) {
            return Err(ValidateConfigError::RunImageMismatch {
                run_image: first_run_image.cloned().unwrap_or_default(),
                stack_run_image: stack.run_image.clone(),
            });
        }
    }

    Ok(())
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ValidateConfigError {
    #[error("build.image is required")]
    BuildImageRequired,
    #[error("build.image and stack.build-image do not match: `{build_image}` != `{stack_build_image}`")]
    BuildImageMismatch {
        build_image: String,
        stack_build_image: String,
    },
    #[error("run.images are required")]
    RunImagesRequired,
    #[error("run.images.image is required")]
    RunImageRequired,
    #[error("run.images and stack.run-image do not match: `{run_image}` != `{stack_run_image}`")]
    RunImageMismatch {
        run_image: String,
        stack_run_image: String,
    },
}
