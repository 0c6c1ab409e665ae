use anyhow::Result;

use crate::chunk::config::load_config;
use crate::chunk::naming::{ChunkFilenameGenerator, IdScheme, new_generator};
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub prefix: String,
    pub extension: String,
    pub count: usize,
    pub scheme: Option<String>,
}

pub fn generate(generator: &dyn ChunkFilenameGenerator, opts: &GenerateOptions) -> Vec<String> {
    (0..opts.count)
        .map(|_| {
            format!(
                "{} id={}",
                generator.generate_filename(&opts.prefix, &opts.extension),
                generator.generate_id()
            )
        })
        .collect()
}

pub fn run(opts: &GenerateOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("generate");
    let scheme = match opts.scheme.as_deref() {
        Some(raw) => IdScheme::parse(raw),
        None => load_config()?.reconcile.id_scheme(),
    };
    report.detail(format!("scheme={scheme}"));

    let generator = new_generator(scheme);
    for line in generate(generator.as_ref(), opts) {
        report.detail(line);
    }
    Ok(report)
}
