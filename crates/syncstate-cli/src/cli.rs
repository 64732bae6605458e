use std::path::PathBuf;

use clap::{Parser, Subcommand};
use syncstate_core::StreamDescriptor;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "syncstate")]
#[command(about = "Inspect and repair connection sync state")]
#[command(version)]
pub struct Cli {
    /// Environment to load (loads .env.{ENV} instead of .env)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Path to syncstate.toml config file
    #[arg(short, long, global = true, default_value = "syncstate.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the current state of a connection as a checkpoint blob
    Get {
        /// Connection ID
        connection: Uuid,
    },

    /// Write a checkpoint blob (JSON file) as the state of a connection
    Set {
        /// Connection ID
        connection: Uuid,

        /// JSON file holding the checkpoint
        file: PathBuf,
    },

    /// Erase all state of a connection
    Erase {
        /// Connection ID
        connection: Uuid,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Delete the state of specific streams
    DeleteStreams {
        /// Connection ID
        connection: Uuid,

        /// Stream to delete, as name or name:namespace (repeatable)
        #[arg(long = "stream", value_parser = parse_stream, required = true)]
        streams: Vec<StreamDescriptor>,
    },

    /// Show every connection that has state
    Status,

    /// Manage the configured streams of connections
    Streams {
        #[command(subcommand)]
        command: StreamsCommands,
    },
}

#[derive(Subcommand)]
pub enum StreamsCommands {
    /// List the configured streams of a connection
    List {
        /// Connection ID
        connection: Uuid,
    },

    /// Add streams to a connection
    Register {
        /// Connection ID
        connection: Uuid,

        /// Stream to add, as name or name:namespace (repeatable)
        #[arg(long = "stream", value_parser = parse_stream, required = true)]
        streams: Vec<StreamDescriptor>,
    },

    /// Remove streams from a connection
    Remove {
        /// Connection ID
        connection: Uuid,

        /// Stream to remove, as name or name:namespace (repeatable)
        #[arg(long = "stream", value_parser = parse_stream, required = true)]
        streams: Vec<StreamDescriptor>,
    },
}

/// Parse `name` or `name:namespace`.
pub fn parse_stream(s: &str) -> Result<StreamDescriptor, String> {
    let (name, namespace) = match s.split_once(':') {
        Some((name, namespace)) => (name, Some(namespace)),
        None => (s, None),
    };

    if name.is_empty() {
        return Err(format!("invalid stream '{}': name must not be empty", s));
    }

    Ok(StreamDescriptor {
        name: name.to_string(),
        namespace: namespace.map(String::from),
    })
}

/// Inverse of [`parse_stream`].
pub fn format_stream(stream: &StreamDescriptor) -> String {
    match &stream.namespace {
        Some(ns) => format!("{}:{}", stream.name, ns),
        None => stream.name.clone(),
    }
}
