use super::{utils, Cli};
use crate::decompiler::{Decompiler, RunReport};
use crate::error::Result as DecompilerResult;
use crate::usecode::{FlagNames, IntrinsicNames, UsecodeImage};

/// Run one `ucxt` invocation: decode, render, write, report
pub fn decompile(cli: &Cli) -> DecompilerResult<RunReport> {
    let options = cli.options();
    log::info!("Inputting from file: {}", cli.input.display());
    let bytes = utils::read_file(&cli.input)?;

    let flag_names = match &cli.global_flags {
        Some(path) => {
            log::info!("Reading flag names from file: {}", path.display());
            Some(FlagNames::parse(&utils::read_file(path)?))
        }
        None => None,
    };
    let intrinsics = match &cli.intrinsics {
        Some(path) => {
            let text = String::from_utf8_lossy(&utils::read_file(path)?).into_owned();
            Some(IntrinsicNames::parse(&text)?)
        }
        None => None,
    };

    let image = UsecodeImage::parse(&bytes, &options)?;
    let output = Decompiler::new(&image, &options)
        .with_flag_names(flag_names)
        .with_intrinsics(intrinsics)
        .run()?;

    if let Some(path) = &cli.output {
        log::info!("Outputting to filename: {}", path.display());
    }
    utils::write_output(&output.text, cli.output.as_deref())?;
    for message in &output.report.messages {
        eprintln!("{}", message);
    }
    Ok(output.report)
}
