use crate::logio::LogLevel;
use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "logio-dashboard")]
#[command(about = "Stream a dashboard's log.io feed to the terminal")]
pub struct AppArgs {
    #[arg(long, help = "Dashboard origin, e.g. https://host:4000")]
    pub origin: Option<String>,

    #[arg(long, env = "LOGIO_TOKEN", hide_env_values = true, help = "log.io access token")]
    pub token: Option<String>,

    #[arg(long, help = "Minimum level to stream (DBUG, INFO, WARN, ERRO)")]
    pub level: Option<LogLevel>,

    #[arg(long, help = "Interface language, e.g. en-US or zh")]
    pub lang: Option<String>,

    #[arg(long, help = "Directory of <code>.json language files to use instead of the built-in ones")]
    pub lang_dir: Option<String>,

    #[arg(long, help = "Config file path (JSON)")]
    pub config: Option<String>,

    #[arg(long, help = "Data directory [default: data]")]
    pub data_dir: Option<String>,

    #[arg(long, help = "Keep translator state in memory only")]
    pub no_cache: bool,

    #[arg(long, help = "Close the stream on malformed messages instead of skipping them")]
    pub strict_json: bool,

    #[arg(long, help = "Seconds to wait for the connection and the auth reply [default: 15]")]
    pub dial_timeout: Option<u64>,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl AppArgs {
    pub fn from_cli() -> Self {
        <Self as Parser>::parse()
    }
}
