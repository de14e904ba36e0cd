use clap::{Parser, Subcommand};

/// toolcell - dynamic tool execution in ephemeral sandboxes
#[derive(Parser, Debug)]
#[command(name = "toolcell")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Listen address (default: from TOOLCELL_LISTEN or 0.0.0.0:8080)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Execute a tool through the full pipeline and print the envelope
    Execute {
        /// Tool name as registered in the catalog
        #[arg(value_name = "TOOL_NAME")]
        tool_name: String,

        /// Input JSON string. Use "-" to read from stdin
        #[arg(value_name = "INPUT_JSON")]
        input_json: String,
    },

    /// List tool names registered in the catalog
    Tools,

    /// List tool names available in the remote artifact repository
    Remote,

    /// Structurally verify a downloaded tool source file
    Verify {
        /// Path to the tool source file
        #[arg(value_name = "FILE")]
        file_path: String,
    },

    /// Import tool descriptors (a JSON array) into the catalog
    CatalogImport {
        /// Path to the descriptor file
        #[arg(value_name = "FILE")]
        file_path: String,
    },
}
