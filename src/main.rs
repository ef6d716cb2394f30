//! scannotate CLI - inspect scan geometry and scene graphs.

use std::env;
use std::fs;
use std::process;

use scannotate::geom::compute_bounds;
use scannotate::graph::{convert_multiscan, InferenceThresholds, MultiScanAnnotations, SceneGraph};
use scannotate::ply;
use scannotate::Result;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut filter = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => filter = "debug",
            "-vv" | "--trace" => filter = "trace",
            "-q" | "--quiet" => filter = "error",
            _ => filtered_args.push(arg),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    if filtered_args.is_empty() {
        print_usage(&args[0]);
        return;
    }

    let result = match filtered_args[0] {
        "info" | "i" => {
            if filtered_args.len() < 2 {
                eprintln!("Usage: {} info <file.ply>", args[0]);
                process::exit(1);
            }
            cmd_info(filtered_args[1])
        }
        "graph" | "g" => {
            if filtered_args.len() < 2 {
                eprintln!("Usage: {} graph <scene_graph.json>", args[0]);
                process::exit(1);
            }
            cmd_graph(filtered_args[1])
        }
        "convert" | "c" => {
            if filtered_args.len() < 2 {
                eprintln!("Usage: {} convert <multiscan.annotations.json>", args[0]);
                process::exit(1);
            }
            cmd_convert(filtered_args[1])
        }
        "help" | "h" | "-h" | "--help" => {
            print_usage(&args[0]);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("scannotate - inspect scan geometry and scene graphs");
    println!();
    println!("Usage: {} [options] <command> <file>", prog);
    println!();
    println!("Commands:");
    println!("  i, info     Decode a PLY file and show geometry stats");
    println!("  g, graph    Summarize a scene-graph JSON file");
    println!("  c, convert  Convert MultiScan annotations to scene-graph JSON");
    println!("  h, help     Show this help");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Errors only");
}

fn cmd_info(path: &str) -> Result<()> {
    let geometry = ply::decode_file(path)?;

    println!("File: {}", path);
    println!(
        "Vertices: {} ({} declared)",
        geometry.vertex_count(),
        geometry.stats.declared_vertices
    );
    println!(
        "Faces: {} ({} declared, {} dropped)",
        geometry.face_count(),
        geometry.stats.declared_faces,
        geometry.stats.dropped_faces
    );
    println!("Colors: {}", if geometry.has_colors { "yes" } else { "no" });
    if geometry.stats.truncated() {
        println!("Warning: buffer was truncated; decode is partial");
    }

    match compute_bounds(&geometry.points) {
        Some(bounds) => {
            println!(
                "Bounds: [{:.2} {:.2} {:.2}] - [{:.2} {:.2} {:.2}]",
                bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
            );
            println!(
                "Center: [{:.2} {:.2} {:.2}], size [{:.2} {:.2} {:.2}] ({} plausible points)",
                bounds.center.x,
                bounds.center.y,
                bounds.center.z,
                bounds.size.x,
                bounds.size.y,
                bounds.size.z,
                bounds.used_points
            );
        }
        None => println!("Bounds: no plausible points"),
    }
    Ok(())
}

fn cmd_graph(path: &str) -> Result<()> {
    let graph = SceneGraph::from_json(&fs::read_to_string(path)?)?;

    println!("Scene: {}", graph.id);
    println!("Objects: {}", graph.objects.len());
    println!("Relationships: {}", graph.relationships.len());
    println!("Attributes: {}", graph.attributes.len());
    println!("Predicates: {}", graph.predicate_set().join(", "));

    for obj in &graph.objects {
        let outgoing = graph.outgoing_relationships(obj.id).count();
        let between = graph.in_between_relationships(obj.id).count();
        println!(
            "  [{}] {} - {} attrs, {} outgoing, {} in-between",
            obj.id,
            obj.primary_label(),
            graph.attributes_for(obj.id).count(),
            outgoing,
            between
        );
    }
    Ok(())
}

fn cmd_convert(path: &str) -> Result<()> {
    let doc = MultiScanAnnotations::from_json(&fs::read_to_string(path)?)?;
    let graph = convert_multiscan(&doc, &InferenceThresholds::default());
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}
