use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hanime")]
#[command(about = "Query video metadata from hanime1.me", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search videos by text
    Search {
        /// Search terms, joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
    },
    /// Browse videos by tag (comma separated for several)
    Tag {
        tags: String,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
    },
    /// Browse one category
    Category {
        genre: String,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
    },
    /// Newest uploads
    Latest {
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
    },
    /// Most viewed videos
    Popular {
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
    },
    /// Full metadata of one video
    Detail {
        /// Video ID or watch URL
        video: String,
    },
    /// A random video
    Random,
    /// Related videos of one video
    Related {
        /// Video ID or watch URL
        video: String,
    },
    /// List the tags offered by the site
    Tags,
    /// List the categories offered by the site
    Categories,
    /// Fetch a video's thumbnail into a temp file
    Thumb {
        /// Video ID or watch URL
        video: String,

        /// Blur level 0-100 (default: from config)
        #[arg(short, long)]
        blur: Option<u8>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_joins_words_and_defaults_page() {
        let cli = Cli::try_parse_from(["hanime", "search", "love", "live"]).unwrap();
        match cli.command {
            Commands::Search { query, page } => {
                assert_eq!(query, vec!["love", "live"]);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_negative_page_reaches_the_scraper() {
        let cli = Cli::try_parse_from(["hanime", "latest", "--page", "-2"]).unwrap();
        assert!(matches!(cli.command, Commands::Latest { page: -2 }));
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["hanime", "random", "--config", "hanime.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("hanime.toml")));
    }

    #[test]
    fn test_thumb_blur_is_optional() {
        let cli = Cli::try_parse_from(["hanime", "thumb", "39811", "--blur", "40"]).unwrap();
        assert!(matches!(cli.command, Commands::Thumb { blur: Some(40), .. }));

        let cli = Cli::try_parse_from(["hanime", "thumb", "39811"]).unwrap();
        assert!(matches!(cli.command, Commands::Thumb { blur: None, .. }));
    }

    #[test]
    fn test_search_requires_query() {
        assert!(Cli::try_parse_from(["hanime", "search"]).is_err());
    }
}
