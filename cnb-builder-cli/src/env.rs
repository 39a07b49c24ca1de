use crate::cli::EnvArgs;
use crate::error::Error;
use cnb_builder_config::{
    ParseBuildConfigEnvError, parse_build_config_env, read_config, write_build_config_env_dir,
};
use log::{info, warn};

pub(crate) fn execute(args: &EnvArgs) -> Result<(), Error> {
    let (config, warnings) = read_config(&args.config).map_err(Error::ReadConfig)?;

    for warning in warnings {
        warn!("{warning}");
    }

    let parsed = match parse_build_config_env(&config.build.env, &args.config) {
        Ok(parsed) => parsed,
        Err(error) => {
            if let ParseBuildConfigEnvError::MissingDelimiter { parsed, .. } = &error {
                for warning in &parsed.warnings {
                    warn!("{warning}");
                }
            }

            return Err(Error::ParseBuildConfigEnv(error));
        }
    };

    for warning in &parsed.warnings {
        warn!("{warning}");
    }

    match &args.output_dir {
        Some(output_dir) => {
            write_build_config_env_dir(&parsed.env, output_dir)
                .map_err(|error| Error::WriteEnvDirectory(output_dir.clone(), error))?;

            info!(
                "Wrote {} env file(s) to {}",
                parsed.env.len(),
                output_dir.to_string_lossy()
            );
        }
        None => {
            for (key, value) in &parsed.env {
                println!("{key}={value}");
            }
        }
    }

    Ok(())
}
