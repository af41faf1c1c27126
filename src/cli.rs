use std::error::Error;
use std::sync::Arc;

use atty::Stream;
use clap::{Parser, Subcommand};
use listing_studio::annotate::{Segment, annotate, keywords_in_text};
use listing_studio::listing::{CharBadge, KEYWORD_CHAR_LIMIT, KeywordVolume, ListingData};
use listing_studio::{GeminiBackend, GeminiConfig, GenerateError, ListingGateway};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "listing_studio=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(
    name = "listing-studio",
    about = "Draft marketplace listings and highlight their keywords",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a listing from a product description.
    Generate {
        /// Product description; multiple words are joined with spaces.
        #[arg(required = true)]
        description: Vec<String>,
        /// Override the Gemini model for this call.
        #[arg(long)]
        model: Option<String>,
    },
    /// Split text into plain and keyword segments.
    Annotate {
        /// Keyword to highlight (repeatable).
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
        /// Text to annotate.
        text: String,
    },
    /// Launch the HTTP front end.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind (host:port).
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used for canonical links.
        #[arg(long)]
        base_url: Option<String>,
        /// Color scheme: system, light or dark.
        #[arg(long, default_value = "system")]
        color_scheme: String,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Command::Generate { description, model } => {
            handle_generate(description.join(" "), model, cli.json)
        }
        Command::Annotate { keywords, text } => handle_annotate(&text, &keywords, cli.json),
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            base_url,
            color_scheme,
        } => handle_serve(addr, base_url, &color_scheme),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_gateway(model: Option<String>) -> Result<ListingGateway, Box<dyn Error>> {
    let mut config = GeminiConfig::from_env()?;
    if let Some(model) = model {
        config = config.with_model(model);
    }
    let backend = GeminiBackend::new(config)?;
    Ok(ListingGateway::new(Arc::new(backend)))
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn handle_generate(
    description: String,
    model: Option<String>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if description.trim().is_empty() {
        return Err("Product description cannot be empty".into());
    }
    let gateway = build_gateway(model)?;
    let listing = runtime()?
        .block_on(gateway.generate(&description))
        .map_err(|err: GenerateError| err.user_message())?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        print_listing(&listing);
    }
    Ok(())
}

fn handle_annotate(text: &str, keywords: &[String], as_json: bool) -> Result<(), Box<dyn Error>> {
    let segments = annotate(text, keywords);
    let present = keywords_in_text(text, keywords);

    if as_json {
        let payload = json!({
            "text": text,
            "keywords": keywords,
            "keywords_present": present,
            "segments": segments,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        render_segments("Annotated", &segments);
        if present.is_empty() {
            println!("\nNo keywords matched.");
        } else {
            println!("\nMatched keywords: {}", present.join(", "));
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(
    addr: std::net::SocketAddr,
    base_url: Option<String>,
    color_scheme: &str,
) -> Result<(), Box<dyn Error>> {
    use listing_studio::web::{ColorScheme, WebConfig, serve};

    let color_scheme: ColorScheme = color_scheme.parse()?;
    let base_url = base_url
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("http://{addr}"));
    let config = WebConfig {
        addr,
        base_url,
        color_scheme,
        ..WebConfig::default()
    };
    let gateway = build_gateway(None)?;
    runtime()?.block_on(serve(config, gateway))?;
    Ok(())
}

fn print_listing(listing: &ListingData) {
    let in_title = keywords_in_text(&listing.title, &listing.keywords);

    println!("Title ({}):", badge_label(&listing.title_badge()));
    render_segments_inline(&annotate(&listing.title, &in_title));
    println!("\nDescription ({}):", badge_label(&listing.description_badge()));
    render_segments_inline(&annotate(&listing.description, &listing.keywords));
    println!("\nCategory: {}", listing.category);

    print_keyword_table(&listing.keywords, &in_title);

    if !listing.materials.is_empty() {
        println!("\nMaterials: {}", listing.materials.join(", "));
    }
}

fn print_keyword_table(keywords: &[String], in_title: &[String]) {
    if keywords.is_empty() {
        println!("\nNo keywords generated.");
        return;
    }
    let width = keywords
        .iter()
        .map(|keyword| keyword.chars().count())
        .max()
        .unwrap_or(7)
        .max("KEYWORD".len());
    println!();
    println!(
        "{:<width$}  {:<6}  {:<7}  {}",
        "KEYWORD",
        "VOLUME",
        "CHARS",
        "IN TITLE",
        width = width
    );
    println!(
        "{:-<width$}  {:-<6}  {:-<7}  {}",
        "",
        "",
        "",
        "--------",
        width = width
    );
    for (index, keyword) in keywords.iter().enumerate() {
        let badge = CharBadge::new(keyword, KEYWORD_CHAR_LIMIT);
        let marker = if in_title.contains(keyword) { "yes" } else { "" };
        println!(
            "{:<width$}  {:<6}  {:<7}  {}",
            keyword,
            KeywordVolume::for_index(index).query_value(),
            badge_label(&badge),
            marker,
            width = width
        );
    }
}

fn badge_label(badge: &CharBadge) -> String {
    if badge.over_limit {
        format!("{badge} over")
    } else {
        badge.to_string()
    }
}

/// Matched segments as `**bold**` for the terminal skin.
fn segments_markdown(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| {
            if segment.is_matched() {
                format!("**{}**", segment.text)
            } else {
                segment.text.clone()
            }
        })
        .collect()
}

fn segments_plain(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| {
            if segment.is_matched() {
                format!("[{}]", segment.text)
            } else {
                segment.text.clone()
            }
        })
        .collect()
}

fn render_segments(title: &str, segments: &[Segment]) {
    println!("{title}:");
    render_segments_inline(segments);
}

fn render_segments_inline(segments: &[Segment]) {
    if stdout_is_tty() {
        let skin = markdown_skin();
        let markdown = segments_markdown(segments);
        let formatted = FmtText::from(&skin, markdown.trim(), Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{}", segments_plain(segments));
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn markdown_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.bold.set_fg(termimad::crossterm::style::Color::Magenta);
    skin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rendering_brackets_matches() {
        let segments = annotate("A leather tote bag", &["tote bag"]);
        assert_eq!(segments_plain(&segments), "A leather [tote bag]");
        assert_eq!(segments_markdown(&segments), "A leather **tote bag**");
    }

    #[test]
    fn over_limit_badge_is_flagged() {
        let badge = CharBadge::new("an extremely long keyword", KEYWORD_CHAR_LIMIT);
        assert_eq!(badge_label(&badge), "25 / 20 over");
    }

    #[test]
    fn cli_parses_repeated_keywords() {
        let cli = Cli::try_parse_from([
            "listing-studio",
            "--json",
            "annotate",
            "-k",
            "tote",
            "--keyword",
            "tote bag",
            "leather tote bag",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Annotate { keywords, text } => {
                assert_eq!(keywords, vec!["tote", "tote bag"]);
                assert_eq!(text, "leather tote bag");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
