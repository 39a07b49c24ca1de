use crate::cli::ResolveArgs;
use crate::error::Error;
use cnb_builder_common::toml_file::write_toml_file;
use cnb_builder_config::uri::PlatformUriResolver;
use cnb_builder_config::{Config, MultiArchConfig, read_multi_arch_config, validate_config};
use cnb_builder_data::target::Target;
use log::{info, warn};
use std::path::Path;

type Result<T> = std::result::Result<T, Error>;

pub(crate) fn execute(args: &ResolveArgs) -> Result<()> {
    let (mut multi_arch_config, warnings) =
        read_multi_arch_config(&args.config, args.targets.clone()).map_err(Error::ReadConfig)?;

    for warning in warnings {
        warn!("{warning}");
    }

    if multi_arch_config.targets().is_empty() {
        let host = Target::host();
        info!("No targets configured, resolving for host target {host}");

        let relative_base_dir = multi_arch_config.relative_base_dir().to_path_buf();
        multi_arch_config =
            MultiArchConfig::new(multi_arch_config.config, vec![host], relative_base_dir);
    }

    let configs = multi_arch_config
        .builder_configs(&PlatformUriResolver::offline())
        .map_err(Error::ResolveConfigs)?;

    info!("Resolved {} builder configuration(s)", configs.len());

    for config in &configs {
        validate_config(config)
            .map_err(|error| Error::ValidateConfig(target_name(config), error))?;
    }

    match &args.output_dir {
        Some(output_dir) => {
            for config in &configs {
                write_config(config, output_dir)?;
            }
        }
        None => {
            for config in &configs {
                let contents = toml::to_string(config)
                    .map_err(|error| Error::SerializeConfig(target_name(config), error))?;

                println!("# {}\n{contents}", target_name(config));
            }
        }
    }

    Ok(())
}

fn write_config(config: &Config, output_dir: &Path) -> Result<()> {
    let config_dir = output_dir.join(
        config
            .with_targets
            .first()
            .map(target_dir_name)
            .unwrap_or_default(),
    );

    std::fs::create_dir_all(&config_dir)
        .map_err(|error| Error::CreateOutputDirectory(config_dir.clone(), error))?;

    let config_path = config_dir.join("builder.toml");
    write_toml_file(config, &config_path).map_err(Error::WriteConfig)?;

    println!("{}", config_path.to_string_lossy());

    Ok(())
}

fn target_name(config: &Config) -> String {
    config
        .with_targets
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// A directory name for the output of a concrete target: `os-arch[-variant][-distro[-version]]`.
fn target_dir_name(target: &Target) -> String {
    let mut parts = vec![target.os.as_str()];

    for part in [target.arch.as_str(), target.arch_variant.as_str()] {
        if !part.is_empty() {
            parts.push(part);
        }
    }

    if let Some((name, version)) = target.distro() {
        parts.push(name);
        parts.extend(version);
    }

    parts.join("-")
}
