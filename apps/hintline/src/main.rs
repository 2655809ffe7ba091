mod args;
mod logger;

use args::CliArgs;
use args::Command;
use hl_core::HintError;
use hl_core::HintResult;
use hl_events::Event;
use hl_events::EventBus;
use hl_events::EventFilter;
use hl_events::EventKind;
use hl_events::FetchEnd;
use hl_events::Response;
use hl_events::ResponseBody;
use hl_js::ScriptValue;
use hl_parser_html::HtmlParserPlugin;
use hl_parser_html::ParserConfig;
use log::LevelFilter;
use std::cell::Cell;
use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use url::Url;

type Evaluations = Rc<RefCell<Vec<(String, HintResult<ScriptValue>)>>>;

fn main() -> ExitCode {
    let command = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(error) => {
            eprintln!("hintline: {error}");
            eprintln!("{}", args::USAGE);
            return ExitCode::from(2);
        }
    };

    let cli = match command {
        Command::Help => {
            println!("{}", args::USAGE);
            return ExitCode::SUCCESS;
        }
        Command::Run(cli) => cli,
    };

    let level = match cli.log_level {
        Some(level) => level,
        None => match std::env::var(args::LOG_ENV) {
            Ok(value) => args::parse_level(&value).unwrap_or_else(|error| {
                eprintln!("hintline: ignoring {}: {error}", args::LOG_ENV);
                LevelFilter::Warn
            }),
            Err(_) => LevelFilter::Warn,
        },
    };
    if let Err(error) = logger::init(level) {
        eprintln!("hintline: logger unavailable: {error}");
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("hintline: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Parses the input file and prints its events; returns false when any
/// evaluation failed.
fn run(cli: &CliArgs) -> HintResult<bool> {
    let body = std::fs::read(&cli.input).map_err(|error| {
        HintError::new(
            "cli.read_failed",
            format!("cannot read {}: {error}", cli.input.display()),
        )
    })?;

    let url = match &cli.url {
        Some(url) => url.clone(),
        None => std::fs::canonicalize(&cli.input)
            .ok()
            .and_then(|path| Url::from_file_path(path).ok())
            .map(String::from)
            .unwrap_or_else(|| cli.input.display().to_string()),
    };
    let fetch = FetchEnd {
        resource: cli.resource.clone().unwrap_or_else(|| url.clone()),
        response: Response {
            url,
            status_code: 200,
            media_type: cli.media_type.clone(),
            charset: None,
            body: ResponseBody {
                content: String::new(),
                raw_content: Some(body),
            },
        },
    };

    let bus = EventBus::shared(Default::default())?;
    subscribe_printer(&bus)?;
    let evaluations = subscribe_evaluator(&bus, cli.scripts.clone())?;
    HtmlParserPlugin::attach(
        &bus,
        ParserConfig {
            strict: cli.strict,
            ..ParserConfig::default()
        },
    )?;

    bus.emit(&Event::FetchEnd(&fetch))?;

    let mut all_ok = true;
    for (script, result) in evaluations.take() {
        match result {
            Ok(value) => println!("eval {script:?} => {value}"),
            Err(error) => {
                all_ok = false;
                println!("eval {script:?} failed: {error}");
            }
        }
    }
    Ok(all_ok)
}

fn subscribe_printer(bus: &EventBus) -> HintResult<()> {
    let depth = Cell::new(0_usize);
    bus.on(EventFilter::All, move |event| {
        if matches!(event, Event::TraverseUp { .. }) {
            depth.set(depth.get().saturating_sub(1));
        }

        let indent = "  ".repeat(depth.get());
        match event {
            Event::Element { element, .. } => match element.location() {
                Some(at) => println!("{indent}{} @{}:{}", event.name(), at.line, at.column),
                None => println!("{indent}{}", event.name()),
            },
            _ => println!("{indent}{}", event.name()),
        }

        if matches!(event, Event::TraverseDown { .. }) {
            depth.set(depth.get() + 1);
        }
        Ok(())
    })?;
    Ok(())
}

fn subscribe_evaluator(bus: &EventBus, scripts: Vec<String>) -> HintResult<Evaluations> {
    let results: Evaluations = Rc::default();
    if scripts.is_empty() {
        return Ok(results);
    }

    let sink = Rc::clone(&results);
    bus.on(EventFilter::Kind(EventKind::ParseEnd), move |event| {
        if let Event::ParseEnd(parse) = event {
            let mut sink = sink.borrow_mut();
            for script in &scripts {
                sink.push((script.clone(), parse.window.evaluate(script)));
            }
        }
        Ok(())
    })?;
    Ok(results)
}
