use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use flowedit::config::Config;
use flowedit::export::{svg_to_pdf, svg_to_png};
use flowedit::flowchart::{
    self, DiagramStyle, Direction, Editor, LayoutEngine, ParserOptions, apply_layout, normalize,
    parse_with, render_svg,
};
use flowedit::theme::Theme;
use tracing::Level;

/// Lay out a Mermaid-style flowchart and render it
#[derive(Parser, Debug)]
#[command(name = "flowedit")]
#[command(about = "Render Mermaid-style flowcharts to SVG, PNG, PDF or JSON", long_about = None)]
struct Args {
    /// Input flowchart file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path (extension determines format: .svg, .png, .pdf or .json)
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Override the direction from the header (TB or LR)
    #[arg(short, long, value_name = "DIRECTION")]
    direction: Option<Direction>,

    /// Built-in theme name or path to an Alacritty theme file (YAML or TOML)
    #[arg(short, long, value_name = "THEME")]
    theme: Option<String>,

    /// Layout and editor settings (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Space around the diagram in pixels
    #[arg(long)]
    padding: Option<f32>,

    /// Raster scale multiplier for PNG output (e.g. 2.0 for sharper output)
    #[arg(long, default_value_t = 1.0)]
    png_scale: f32,

    /// Draw `{...}` nodes as diamonds
    #[arg(long)]
    infer_shapes: bool,

    /// Log parser and layout decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };

    let theme = match args.theme.as_deref().or(config.theme.as_deref()) {
        Some(name) => Theme::resolve(name).map_err(|e| e.to_string())?,
        None => Theme::default(),
    };
    let mut style = DiagramStyle::from_theme(&theme);
    style.font_size = config.editor.font_size;
    if let Some(padding) = args.padding {
        style.padding = padding;
    }

    let source = if args.input.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)
            .map_err(|e| format!("Failed to read input file: {}", e))?
    };

    let options = ParserOptions {
        infer_shapes: args.infer_shapes,
    };
    let mut graph = flowchart::build(parse_with(&normalize(&source), options), &config.layout);
    if let Some(direction) = args.direction {
        graph.direction = direction;
    }
    let layout = LayoutEngine::new(&config.layout).layout_graph(&graph);
    apply_layout(&mut graph, &layout);

    let output_ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .ok_or("Output file has no extension")?
        .to_ascii_lowercase();

    match output_ext.as_str() {
        "svg" => {
            let svg = render_svg(&graph, &style, None);
            std::fs::write(&args.output, svg).map_err(|e| format!("Failed to write SVG: {}", e))?;
            eprintln!("SVG saved to: {}", args.output.display());
        }
        "png" => {
            let svg = render_svg(&graph, &style, None);
            let png_data = svg_to_png(&svg, args.png_scale).map_err(|e| e.to_string())?;
            std::fs::write(&args.output, png_data)
                .map_err(|e| format!("Failed to write PNG: {}", e))?;
            eprintln!("PNG saved to: {}", args.output.display());
        }
        "pdf" => {
            let svg = render_svg(&graph, &style, None);
            let pdf_data = svg_to_pdf(&svg).map_err(|e| e.to_string())?;
            std::fs::write(&args.output, pdf_data)
                .map_err(|e| format!("Failed to write PDF: {}", e))?;
            eprintln!("PDF saved to: {}", args.output.display());
        }
        "json" => {
            let mut editor = Editor::with_defaults();
            editor.load_graph(graph);
            let json = serde_json::to_string_pretty(&editor.snapshot())
                .map_err(|e| format!("Failed to serialize snapshot: {}", e))?;
            std::fs::write(&args.output, json)
                .map_err(|e| format!("Failed to write JSON: {}", e))?;
            eprintln!("JSON saved to: {}", args.output.display());
        }
        _ => {
            return Err(format!(
                "Unsupported output format: .{} (use .svg, .png, .pdf or .json)",
                output_ext
            ));
        }
    }

    Ok(())
}
