use crate::cli::args::ServicesArgs;
use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;

/// Execute services command
pub async fn execute(args: ServicesArgs, options: &GlobalOptions) -> Result<()> {
    let config = Config::load()?;
    let directory = super::load_directory(options, &config, false)?;
    let formatter = Formatter::new(options.format);

    let output = match args.name {
        Some(name) => formatter.format_service(directory.get(&name)?)?,
        None => formatter.format_services(&directory)?,
    };
    println!("{}", output);
    Ok(())
}
