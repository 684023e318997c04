use std::fs::OpenOptions;
use std::io::{stdin, stdout, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusty_money::iso;

use crate::settings::default_config_path;

fn render_config(currency: &str) -> String {
    format!(
        "# Tally configuration.\n\
         # db_file = \"/path/to/tally.db\"\n\
         currency = \"{}\"\n\
         \n\
         [review]\n\
         # Width of the review card area in columns and the fraction of it a\n\
         # drag has to cross before it counts as a decision.\n\
         viewport_width = 80.0\n\
         threshold = 0.25\n",
        currency
    )
}

fn prompt_currency() -> Result<String> {
    let mut buf = String::new();
    print!("Currency <ISO code, default USD>: ");
    stdout().flush()?;
    stdin().read_line(&mut buf)?;

    let code = match buf.trim() {
        "" => "USD".to_string(),
        code => code.to_uppercase(),
    };
    if iso::find(&code).is_none() {
        return Err(anyhow!("{} is not an ISO 4217 currency code", code));
    }
    Ok(code)
}

#[tracing::instrument]
pub(crate) async fn run(conf_path: Option<&str>) -> Result<()> {
    let path = match conf_path {
        Some(p) => p.to_string(),
        None => default_config_path(),
    };
    if let Some(dir) = Path::new(&path).parent() {
        std::fs::create_dir_all(dir)?;
    }

    let currency = prompt_currency()?;
    let mut fd = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("could not create configuration at {}", path))?;
    fd.write_all(render_config(&currency).as_bytes())?;

    println!("Wrote {}", path);
    Ok(())
}
