use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use flowedit::config::Config;
use flowedit::flowchart::{
    ArrowStyle, DeleteRequest, DiagramStyle, Direction, Editor, EditorHost, NodeKind,
    ParserOptions, render_svg,
};
use flowedit::theme::Theme;
use serde_json::json;
use tracing::Level;

/// Drive an editing session from line commands on stdin
#[derive(Parser, Debug)]
#[command(name = "flowedit-session")]
#[command(about = "Apply editor commands to a flowchart and print the results as JSON", long_about = None)]
struct Args {
    /// Flowchart file to start from (empty graph when omitted)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Layout and editor settings (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Theme used by the `svg` command
    #[arg(short, long, value_name = "THEME")]
    theme: Option<String>,

    /// Answer "no" to every delete confirmation
    #[arg(long)]
    refuse_deletes: bool,

    /// Draw `{...}` nodes as diamonds
    #[arg(long)]
    infer_shapes: bool,

    /// Log editor decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

struct SessionHost {
    refuse_deletes: bool,
}

impl EditorHost for SessionHost {
    fn on_request_edit(&mut self, node_id: &str) {
        eprintln!("Editing label of {} (answer with: label {} <text>)", node_id, node_id);
    }

    fn confirm_delete(&mut self, request: &DeleteRequest) -> bool {
        if self.refuse_deletes {
            eprintln!("Delete refused: {:?}", request);
        }
        !self.refuse_deletes
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Add(NodeKind),
    Connect {
        source: String,
        target: String,
        arrow: ArrowStyle,
    },
    DeleteNode(String),
    DeleteEdge(String),
    Label {
        id: String,
        text: String,
    },
    EdgeLabel {
        id: String,
        text: String,
    },
    Kind {
        id: String,
        kind: NodeKind,
    },
    Relayout(Direction),
    Font {
        size: f32,
        color: String,
    },
    Tick,
    Snapshot,
    Svg(PathBuf),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or("Empty command")?;
    let mut arg = |what: &str| {
        words
            .next()
            .map(str::to_string)
            .ok_or_else(|| format!("'{}' needs {}", name, what))
    };

    let command = match name {
        "add" => Command::Add(arg("a node kind")?.parse().map_err(|e| format!("{}", e))?),
        "connect" => {
            let source = arg("a source id")?;
            let target = arg("a target id")?;
            let arrow = match arg("an arrow style") {
                Ok(style) => style.parse().map_err(|e| format!("{}", e))?,
                Err(_) => ArrowStyle::Single,
            };
            Command::Connect {
                source,
                target,
                arrow,
            }
        }
        "delete-node" => Command::DeleteNode(arg("a node id")?),
        "delete-edge" => Command::DeleteEdge(arg("an edge id")?),
        "label" | "edge-label" => {
            let id = arg("an id")?;
            let text = rest_after(line, 2);
            if name == "label" {
                Command::Label { id, text }
            } else {
                Command::EdgeLabel { id, text }
            }
        }
        "kind" => {
            let id = arg("a node id")?;
            let kind = arg("a node kind")?.parse().map_err(|e| format!("{}", e))?;
            Command::Kind { id, kind }
        }
        "relayout" => Command::Relayout(arg("a direction")?.parse().map_err(|e| format!("{}", e))?),
        "font" => {
            let size = arg("a size")?;
            let size = size
                .parse::<f32>()
                .map_err(|e| format!("Invalid font size '{}': {}", size, e))?;
            Command::Font {
                size,
                color: arg("a color")?,
            }
        }
        "tick" => Command::Tick,
        "snapshot" => Command::Snapshot,
        "svg" => Command::Svg(PathBuf::from(arg("an output path")?)),
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok(command)
}

/// Text after the first `words` whitespace-separated words, trimmed.
fn rest_after(line: &str, words: usize) -> String {
    let mut rest = line.trim_start();
    for _ in 0..words {
        rest = rest.trim_start();
        rest = rest.find(char::is_whitespace).map_or("", |i| &rest[i..]);
    }
    rest.trim().to_string()
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

    let host = SessionHost {
        refuse_deletes: args.refuse_deletes,
    };
    let mut editor = Editor::new(host, config.layout.clone(), config.editor.clone())
        .with_parser_options(ParserOptions {
            infer_shapes: args.infer_shapes,
        });

    if let Some(path) = &args.input {
        let source = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read input file: {}", e))?;
        editor.load_source(&source);
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| format!("Failed to read from stdin: {}", e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let reply = match parse_command(line) {
            Ok(command) => run(&mut editor, command, &style),
            Err(message) => json!({ "error": message }),
        };
        let events = editor.drain_events();
        let output = json!({ "command": line, "reply": reply, "events": events });
        writeln!(stdout, "{}", output).map_err(|e| format!("Failed to write output: {}", e))?;
    }

    Ok(())
}

fn run(editor: &mut Editor<SessionHost>, command: Command, style: &DiagramStyle) -> serde_json::Value {
    match command {
        Command::Add(kind) => json!({ "id": editor.add_node(kind) }),
        Command::Connect {
            source,
            target,
            arrow,
        } => json!({ "id": editor.connect(&source, &target, arrow) }),
        Command::DeleteNode(id) => json!({ "deleted": editor.delete_node(&id) }),
        Command::DeleteEdge(id) => json!({ "deleted": editor.delete_edge(&id) }),
        Command::Label { id, text } => json!({ "changed": editor.edit_label(&id, &text) }),
        Command::EdgeLabel { id, text } => {
            json!({ "changed": editor.set_edge_label(&id, Some(&text)) })
        }
        Command::Kind { id, kind } => json!({ "changed": editor.set_node_kind(&id, kind) }),
        Command::Relayout(direction) => {
            editor.relayout(direction);
            json!({ "direction": direction })
        }
        Command::Font { size, color } => match editor.apply_font_settings(size, &color) {
            Ok(()) => json!({ "changed": true }),
            Err(e) => json!({ "error": e.to_string() }),
        },
        Command::Tick => json!({ "cleared": editor.tick(Instant::now()) }),
        Command::Snapshot => json!(editor.snapshot()),
        Command::Svg(path) => {
            let svg = render_svg(editor.graph(), style, editor.selection());
            match std::fs::write(&path, svg) {
                Ok(()) => {
                    eprintln!("SVG saved to: {}", path.display());
                    json!({ "written": path })
                }
                Err(e) => json!({ "error": format!("Failed to write SVG: {}", e) }),
            }
        }
    }
}
