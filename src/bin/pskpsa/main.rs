//! pskpsa CLI - Tool for inspecting and re-encoding PSK/PSA files.

use pskpsa::prelude::*;
use pskpsa::psa::SequenceRecord;
use pskpsa::util::Quat;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Which of the two formats a path holds.
#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Mesh,
    Anim,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut config: Option<String> = None;
    let mut filtered_args: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "off",
            "-c" | "--config" => match iter.next() {
                Some(path) => config = Some(path.clone()),
                None => fail("--config needs a file argument"),
            },
            _ => filtered_args.push(arg.as_str()),
        }
    }

    let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
    if json_mode {
        level = "off";
    }
    init_logging(level);

    let opts = match &config {
        Some(path) => ConvertOptions::load(path).unwrap_or_else(|e| fail(&format!("Failed to load {path}: {e}"))),
        None => ConvertOptions::default(),
    };
    filtered_args.retain(|&s| s != "--json" && s != "-j");

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        // Info command - section and record counts
        "info" | "i" => {
            let path = require(&filtered_args, 1, "pskpsa info <file>");
            cmd_info(path, &opts);
        }

        // Bones command - bone hierarchy
        "bones" | "b" => {
            let path = require(&filtered_args, 1, "pskpsa bones <file>");
            cmd_bones(path, &opts);
        }

        // Seqs command - sequence table
        "seqs" | "s" => {
            let path = require(&filtered_args, 1, "pskpsa seqs <file.psa>");
            cmd_seqs(path);
        }

        // Dump command - keys of one or all sequences
        "dump" | "d" => {
            let path = require(&filtered_args, 1, "pskpsa dump <file.psa> [sequence] [--json]");
            cmd_dump(path, filtered_args.get(2).copied(), json_mode, &opts);
        }

        // Copy command - decode and re-encode
        "copy" | "c" => {
            let input = require(&filtered_args, 1, "pskpsa copy <input> <output>");
            let output = require(&filtered_args, 2, "pskpsa copy <input> <output>");
            cmd_copy(input, output, &opts);
        }

        // Config command - write the effective options as JSON
        "config" => match filtered_args.get(1) {
            Some(path) => {
                if let Err(e) = opts.save(path) {
                    fail(&format!("Failed to write {path}: {e}"));
                }
                println!("Wrote {path}");
            }
            None => match serde_json::to_string_pretty(&opts) {
                Ok(json) => println!("{json}"),
                Err(e) => fail(&e.to_string()),
            },
        },

        "version" | "-V" | "--version" => print_version(),

        // Help
        "help" | "h" | "-h" | "--help" => print_help(),

        // Default: if file exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0], &opts);
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    }
}

/// `RUST_LOG` wins over the command-line level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(msg: &str) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

fn require<'a>(args: &[&'a str], index: usize, usage: &str) -> &'a str {
    match args.get(index) {
        Some(arg) => *arg,
        None => {
            eprintln!("Error: missing argument");
            eprintln!("Usage: {usage}");
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!("pskpsa - PSK/PSA file toolkit");
    println!();
    println!("USAGE:");
    println!("    pskpsa-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <file>              Show section and record counts");
    println!("    b, bones  <file>              Show the bone hierarchy");
    println!("    s, seqs   <file.psa>          List animation sequences");
    println!("    d, dump   <file.psa> [seq]    Dump keys (all sequences or one)");
    println!("    c, copy   <in> <out>          Decode and re-encode a file");
    println!("    config    [file.json]         Print or save the effective options");
    println!("    version                       Show version and build date");
    println!("    h, help                       Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <file.json>  Load conversion options");
    println!("    -j, --json       JSON output (dump)");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Suppress log output");
    println!();
    println!("EXAMPLES:");
    println!("    pskpsa-cli info hero.psk              # Quick overview");
    println!("    pskpsa-cli bones hero.psa             # Bone tree of an animation");
    println!("    pskpsa-cli dump hero.psa Walk --json  # Keys of one sequence as JSON");
    println!("    pskpsa-cli copy in.psk out.psk        # Test round-trip");
    println!();
    println!("NOTES:");
    println!("    - Passing a file directly is equivalent to 'info'");
    println!("    - RUST_LOG overrides -v/-q");
}

fn print_version() {
    let date = option_env!("PSKPSA_BUILD_DATE").unwrap_or("unknown");
    let time = option_env!("PSKPSA_BUILD_TIME").unwrap_or("unknown");
    println!("pskpsa {} (built {} {})", env!("CARGO_PKG_VERSION"), date, time);
}

/// Guess the format from the extension, then from the first section name.
fn detect(path: &str) -> Kind {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("psk") | Some("pskx") => Kind::Mesh,
        Some("psa") => Kind::Anim,
        _ => {
            let first = std::fs::File::open(path)
                .ok()
                .and_then(|f| pskpsa::chunk::read_section(std::io::BufReader::new(f)).ok());
            match first {
                Some(s) if s.name() == pskpsa::psa::records::ANIMHEAD => Kind::Anim,
                _ => Kind::Mesh,
            }
        }
    }
}

fn open_psk(path: &str) -> PskFile {
    tracing::info!("Opening mesh: {}", path);
    PskFile::read(path).unwrap_or_else(|e| fail(&format!("Failed to open {path}: {e}")))
}

fn open_psa(path: &str) -> Psa {
    tracing::info!("Opening animation: {}", path);
    Psa::read(path).unwrap_or_else(|e| fail(&format!("Failed to open {path}: {e}")))
}

fn cmd_info(path: &str, opts: &ConvertOptions) {
    match detect(path) {
        Kind::Mesh => {
            let psk = open_psk(path);
            let mesh = Mesh::from_psk(&psk, opts).unwrap_or_else(|e| fail(&e.to_string()));
            println!("Mesh: {}", path);
            println!();
            println!("Records:");
            println!("  Points:     {}", psk.points.len());
            println!("  Wedges:     {}{}", psk.wedges.len(), if psk.needs_wide_faces() { " (32-bit faces)" } else { "" });
            println!("  Faces:      {}", psk.faces.len());
            println!("  Materials:  {}", psk.materials.len());
            println!("  Bones:      {}", psk.bones.len());
            println!("  Weights:    {} ({} kept)", psk.weights.len(), mesh.weights.len());
            if !psk.colors.is_empty() {
                println!("  Colors:     {}", psk.colors.len());
            }
            if !psk.extra_uvs.is_empty() {
                println!("  Extra UVs:  {} channels", psk.extra_uvs.len());
            }
            if !psk.normals.is_empty() {
                println!("  Normals:    {}", psk.normals.len());
            }
            if !psk.morph_infos.is_empty() {
                println!("  Morphs:     {} ({} deltas)", psk.morph_infos.len(), psk.morph_data.len());
            }
            println!();
            println!("Materials:");
            for (i, m) in mesh.materials.iter().enumerate() {
                println!("  [{i}] {}", m.name);
            }
            println!();
            println!("UV layers: {}", mesh.uv_layers.iter().map(|l| l.name.as_str()).collect::<Vec<_>>().join(", "));
            println!("Display bone size: {}", mesh.skeleton.bone_size);
        }
        Kind::Anim => {
            let psa = open_psa(path);
            let frames: i32 = psa.sequences.iter().map(|s| s.frame_count).sum();
            println!("Animation: {}", path);
            println!();
            println!("  Bones:      {}", psa.bones.len());
            println!("  Sequences:  {}", psa.sequences.len());
            println!("  Frames:     {}", frames);
            println!("  Keys:       {}", psa.keys.len());
        }
    }
}

fn cmd_bones(path: &str, opts: &ConvertOptions) {
    let records = match detect(path) {
        Kind::Mesh => open_psk(path).bones,
        Kind::Anim => open_psa(path).bones,
    };
    let skeleton = build_skeleton(&records, opts).unwrap_or_else(|e| fail(&e.to_string()));

    println!("Skeleton: {} ({} bones)", path, skeleton.len());
    println!();
    for bone in skeleton.bones.iter().filter(|b| b.is_root()) {
        print_bone(&skeleton, bone.index, 0);
    }
}

fn print_bone(skeleton: &Skeleton, index: usize, depth: usize) {
    let indent = "  ".repeat(depth);
    let bone = &skeleton.bones[index];
    let head = bone.head();
    println!(
        "{}[{}] {}  head=({:.4}, {:.4}, {:.4})",
        indent, bone.index, bone.name, head.x, head.y, head.z
    );
    for &child in &bone.children {
        print_bone(skeleton, child, depth + 1);
    }
}

fn cmd_seqs(path: &str) {
    let psa = open_psa(path);
    println!("Animation: {}", path);
    println!();
    println!("  {:<32} {:>8} {:>8} {:>8}", "Name", "Start", "Frames", "FPS");
    for seq in &psa.sequences {
        println!(
            "  {:<32} {:>8} {:>8} {:>8.2}",
            seq.name(),
            seq.frame_start_index,
            seq.frame_count,
            seq.fps
        );
    }
}

fn cmd_dump(path: &str, sequence: Option<&str>, json_mode: bool, opts: &ConvertOptions) {
    let psa = open_psa(path);
    let selected: Vec<&SequenceRecord> = match sequence {
        Some(name) => vec![psa.sequence(name).unwrap_or_else(|e| fail(&e.to_string()))],
        None => psa.sequences.iter().collect(),
    };
    let bone_names: Vec<String> = psa.bones.iter().map(|b| b.name()).collect();

    if json_mode {
        let decoded = psa.decode_sequences(opts).unwrap_or_else(|e| fail(&e.to_string()));
        let sequences: Vec<serde_json::Value> = decoded
            .iter()
            .filter(|d| selected.iter().any(|s| s.name() == d.name))
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "fps": d.fps,
                    "frames": d.frames.iter().map(|frame| {
                        frame.iter().map(|k| serde_json::json!({
                            "location": k.location.to_array(),
                            "rotation": k.rotation.to_array(),
                        })).collect::<Vec<_>>()
                    }).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": path,
                "bones": bone_names,
                "sequences": sequences,
            }))
            .unwrap_or_default()
        );
        return;
    }

    println!("Animation: {}", path);
    for seq in selected {
        println!();
        println!("Sequence {} ({} frames @ {:.2} fps)", seq.name(), seq.frame_count, seq.fps);
        for frame in 0..seq.frame_count.max(0) as usize {
            let keys = psa.frame_keys(seq, frame).unwrap_or_else(|e| fail(&e.to_string()));
            println!("  frame {frame}:");
            for (name, key) in bone_names.iter().zip(keys) {
                let (axis, angle) = Quat::to_axis_angle(key.rotation);
                println!(
                    "    {:<24} T: ({:.4}, {:.4}, {:.4})  R: {:.2} deg about ({:.3}, {:.3}, {:.3})",
                    name,
                    key.location.x,
                    key.location.y,
                    key.location.z,
                    angle.to_degrees(),
                    axis.x,
                    axis.y,
                    axis.z
                );
            }
        }
    }
}

fn cmd_copy(input: &str, output: &str, opts: &ConvertOptions) {
    let result = match detect(input) {
        Kind::Mesh => {
            let psk = open_psk(input);
            Mesh::from_psk(&psk, opts).and_then(|mesh| write_psk(output, &mesh, opts))
        }
        Kind::Anim => open_psa(input).write(output),
    };
    if let Err(e) = result {
        fail(&format!("Failed to write {output}: {e}"));
    }
    tracing::info!("Wrote {}", output);
}
