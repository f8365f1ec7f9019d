use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");

    enforce_library_hygiene();
}

fn enforce_library_hygiene() {
    // Library code reports through `log` and `Result`, and keeps system
    // matrices sparse. Test modules at the end of a file are not scanned.
    let forbidden = [
        "println!",
        "eprintln!",
        "env_logger",
        ".unwrap()",
        ".expect(",
        ".to_dense()",
    ];

    let mut violations = Vec::new();
    let mut stack = vec![PathBuf::from("src")];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let rel = path.to_string_lossy().to_string();
            let src = match fs::read_to_string(&path) {
                Ok(s) => s,
                Err(_) => continue,
            };
            for (line_no, line) in src.lines().enumerate() {
                if line.starts_with("mod tests") {
                    break;
                }
                for token in &forbidden {
                    if line.contains(token) {
                        violations.push(format!(
                            "{}:{} contains forbidden token '{}'",
                            rel,
                            line_no + 1,
                            token
                        ));
                    }
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\nerror: library hygiene violations detected:");
        for v in violations {
            eprintln!("  - {v}");
        }
        panic!("forbidden constructs in spline-feec library modules");
    }
}
