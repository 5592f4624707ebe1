//! Renders a map from a style XML file into an image and prints how long each phase took.
//!
//! Without arguments the defaults are used: `osm.xml` from the current directory is rendered to
//! `mymap.png`, 800x600 pixels, showing the area between 10.0E 47.5N and 11.1E 48.1N on a white
//! background. A single argument names a JSON file overriding any of these settings:
//!
//! ```shell
//! cargo run --bin render-map -- config.json
//! ```

use anyhow::{anyhow, Context, Result};
use stylemap::pipeline::{self, RenderConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match (args.next(), args.next()) {
        (None, _) => RenderConfig::default(),
        (Some(path), None) => RenderConfig::from_json_file(&path)?,
        (Some(_), Some(_)) => {
            return Err(anyhow!(
                "expected at most one argument - path to a JSON config file"
            ))
        }
    };

    log::debug!("Render config: {config:?}");

    let timings = pipeline::run(&config).context("map rendering failed")?;

    pipeline::write_report(&timings, &mut std::io::stdout().lock())
        .context("failed to print timings")?;

    Ok(())
}
