use log::debug;
use serde_json::Value;
use std::sync::Arc;

use crate::api::{global_context, LogErrorSink, RequestOptions};
use crate::cli::args::CallArgs;
use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::output;
use crate::progress::{messages, ProgressManager};
use crate::service::{Params, ServiceResult};

/// Execute call command
pub async fn execute(args: CallArgs, options: &GlobalOptions) -> Result<()> {
    let config = Config::load()?;
    let directory = super::load_directory(options, &config, true)?;

    let progress = ProgressManager::new(options.quiet || !config.client.show_spinner, options.verbose);
    global_context().init(Arc::new(progress.indicator(messages::REQUESTING)), Arc::new(LogErrorSink));

    let params = build_params(&args.params, args.data.as_deref())?;
    let request_options = RequestOptions {
        show_spinner: progress.is_enabled(),
        ignore_errors: args.ignore_errors,
        cache: args.cache,
        ..Default::default()
    };

    debug!("Calling {}.{} with {:?}", args.service, args.method, params);
    let result = directory
        .call(&args.service, &args.method, params, request_options)
        .await?;

    let rendered = match result {
        ServiceResult::Paginated(pages) if args.all => {
            progress.show_message(messages::FETCHING_PAGES);
            let models = pages.collect_all().await?;
            output::format_models(&models, options.format)?
        }
        other => output::format_result(&other, options.format)?,
    };
    println!("{}", rendered);
    Ok(())
}

/// Collect `KEY=VALUE` pairs and the `--data` payload into call parameters.
pub fn build_params(pairs: &[String], data: Option<&str>) -> Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let (key, value) = parse_param(pair)?;
        params.insert(key, value);
    }
    if let Some(data) = data {
        let payload: Value = serde_json::from_str(data)
            .map_err(|e| GatewayError::InvalidInput(format!("--data is not valid JSON: {}", e)))?;
        params.insert("data".to_string(), payload);
    }
    Ok(params)
}

fn parse_param(pair: &str) -> Result<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| GatewayError::InvalidInput(format!("Expected KEY=VALUE, got '{}'", pair)))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
