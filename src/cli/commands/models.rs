use crate::cli::args::ModelsArgs;
use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::output::Formatter;

/// Execute models command
pub async fn execute(args: ModelsArgs, options: &GlobalOptions) -> Result<()> {
    let config = Config::load()?;
    let registry = super::load_catalog(options, &config)?.registry()?;
    let formatter = Formatter::new(options.format);

    let output = match args.name {
        Some(name) => {
            let schema = registry
                .model(&name)
                .ok_or_else(|| GatewayError::InvalidInput(format!("Unknown model: {}", name)))?;
            formatter.format_schema(schema)?
        }
        None => formatter.format_registry(&registry)?,
    };
    println!("{}", output);
    Ok(())
}
