use crate::service::Catalog;

/// Execute version command
pub fn execute() {
    println!("gateway {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Built-in catalogs: {}", Catalog::builtin_names().join(", "));
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
}
