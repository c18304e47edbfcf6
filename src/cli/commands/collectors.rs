use crate::collectors::{SCRAPER_NAMES, Scraper, all_factories};
use clap::{Arg, ArgAction, Command};

/// Adds a `--collect.<name>` / `--no-collect.<name>` pair for every scraper.
pub fn add_collectors_args(mut cmd: Command) -> Command {
    let factories = all_factories();

    for &name in SCRAPER_NAMES {
        let scraper = factories.get(name).and_then(|factory| factory().ok());
        let default_enabled = scraper.as_ref().is_some_and(Scraper::enabled_by_default);
        let about = scraper.as_ref().map_or(name, Scraper::help);

        let enable_flag: &'static str = Box::leak(format!("collect.{name}").into_boxed_str());
        let disable_flag: &'static str = Box::leak(format!("no-collect.{name}").into_boxed_str());

        let default_indicator = if default_enabled {
            "[default: enabled]"
        } else {
            "[default: disabled]"
        };
        let enable_help: &'static str =
            Box::leak(format!("{about} {default_indicator}").into_boxed_str());
        let disable_help: &'static str =
            Box::leak(format!("Disable the {name} scraper").into_boxed_str());

        cmd = cmd
            .arg(
                Arg::new(enable_flag)
                    .long(enable_flag)
                    .help(enable_help)
                    .action(ArgAction::SetTrue)
                    .default_value(if default_enabled { "true" } else { "false" }),
            )
            .arg(
                Arg::new(disable_flag)
                    .long(disable_flag)
                    .help(disable_help)
                    .action(ArgAction::SetTrue)
                    .overrides_with(enable_flag),
            );
    }
    cmd
}
