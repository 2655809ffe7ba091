use hl_core::HintError;
use hl_core::HintResult;
use log::LevelFilter;
use std::path::PathBuf;

pub const USAGE: &str = "usage: hintline <file.html> [--resource <id>] [--url <url>] \
[--media-type <type>] [--eval <script>]... [--strict] [--log-level <level>]";

pub const LOG_ENV: &str = "HINTLINE_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Run(CliArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub input: PathBuf,
    pub resource: Option<String>,
    pub url: Option<String>,
    pub media_type: String,
    pub scripts: Vec<String>,
    pub strict: bool,
    pub log_level: Option<LevelFilter>,
}

impl CliArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> HintResult<Command> {
        let mut args = args.into_iter();
        let mut input = None;
        let mut resource = None;
        let mut url = None;
        let mut media_type = None;
        let mut scripts = Vec::new();
        let mut strict = false;
        let mut log_level = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(Command::Help),
                "--strict" => strict = true,
                "--resource" => resource = Some(value_for(&mut args, &arg)?),
                "--url" => url = Some(value_for(&mut args, &arg)?),
                "--media-type" => media_type = Some(value_for(&mut args, &arg)?),
                "--eval" => scripts.push(value_for(&mut args, &arg)?),
                "--log-level" => log_level = Some(parse_level(&value_for(&mut args, &arg)?)?),
                flag if flag.starts_with("--") => {
                    return Err(HintError::new(
                        "cli.unknown_flag",
                        format!("unknown flag `{flag}`"),
                    ));
                }
                _ if input.is_some() => {
                    return Err(HintError::new(
                        "cli.unexpected_argument",
                        format!("unexpected argument `{arg}`"),
                    ));
                }
                _ => input = Some(PathBuf::from(&arg)),
            }
        }

        let input =
            input.ok_or_else(|| HintError::new("cli.missing_input", "missing input file"))?;
        Ok(Command::Run(Self {
            input,
            resource,
            url,
            media_type: media_type.unwrap_or_else(|| "text/html".to_owned()),
            scripts,
            strict,
            log_level,
        }))
    }
}

fn value_for(args: &mut impl Iterator<Item = String>, flag: &str) -> HintResult<String> {
    args.next()
        .ok_or_else(|| HintError::new("cli.missing_value", format!("missing value after {flag}")))
}

pub fn parse_level(value: &str) -> HintResult<LevelFilter> {
    value.trim().parse::<LevelFilter>().map_err(|_| {
        HintError::new(
            "cli.invalid_log_level",
            format!("unsupported log level `{value}` (expected: off|error|warn|info|debug|trace)"),
        )
    })
}
