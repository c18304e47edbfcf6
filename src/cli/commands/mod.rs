use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

mod collectors;

use crate::exporter::GIT_COMMIT_HASH;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9104";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_TIMEOUT_OFFSET: f64 = 0.25;

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let cmd = Command::new("mysql_exporter")
        .about("MySQL server status exporter for Prometheus")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(GIT_COMMIT_HASH)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("web.listen-address")
                .long("web.listen-address")
                .help("Address to listen on for web interface and telemetry")
                .default_value(DEFAULT_LISTEN_ADDRESS)
                .env("MYSQL_EXPORTER_LISTEN_ADDRESS")
                .value_name("HOST:PORT"),
        )
        .arg(
            Arg::new("web.telemetry-path")
                .long("web.telemetry-path")
                .help("Path under which to expose metrics")
                .default_value(DEFAULT_TELEMETRY_PATH)
                .env("MYSQL_EXPORTER_TELEMETRY_PATH")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("timeout-offset")
                .long("timeout-offset")
                .help("Seconds to subtract from the timeout Prometheus allows for a scrape")
                .default_value("0.25")
                .env("MYSQL_EXPORTER_TIMEOUT_OFFSET")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("config.my-cnf")
                .long("config.my-cnf")
                .help("Path to .my.cnf file to read MySQL credentials from [default: $HOME/.my.cnf]")
                .env("MYSQL_EXPORTER_MY_CNF")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("dsn")
                .long("dsn")
                .help("Database connection string, takes precedence over the .my.cnf file")
                .env("MYSQL_EXPORTER_DSN")
                .hide_env_values(true)
                .value_name("DSN"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        );

    collectors::add_collectors_args(cmd)
}
