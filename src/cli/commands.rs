use crate::database::{DataSource, RemoteParams};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "invchat")]
#[command(author, version, about = "Chat with your inventory database", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the web chat
    Serve {
        /// Listen address, overriding server.listen_addr
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Start an interactive chat in the terminal
    Chat {
        #[command(flatten)]
        source: SourceArgs,

        /// Session id used for transcript storage
        #[arg(long, default_value = "terminal")]
        session_id: String,
    },

    /// Ask a single question and print the answer
    Ask {
        question: String,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// The bundled read-only SQLite file
    Local,
    /// A remote MySQL server
    Mysql,
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Which database to chat with
    #[arg(long, value_enum, default_value_t = SourceKind::Local)]
    pub source: SourceKind,

    #[arg(long, default_value = "")]
    pub mysql_host: String,

    #[arg(long, default_value = "")]
    pub mysql_user: String,

    #[arg(long, env = "MYSQL_PASSWORD", default_value = "", hide_env_values = true)]
    pub mysql_password: String,

    #[arg(long, default_value = "")]
    pub mysql_database: String,
}

impl SourceArgs {
    pub fn data_source(&self) -> DataSource {
        match self.source {
            SourceKind::Local => DataSource::Local,
            SourceKind::Mysql => DataSource::Remote(RemoteParams {
                host: self.mysql_host.clone(),
                user: self.mysql_user.clone(),
                password: self.mysql_password.clone(),
                database: self.mysql_database.clone(),
            }),
        }
    }
}
