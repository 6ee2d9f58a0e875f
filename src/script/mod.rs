//! Script emission for dry runs
//!
//! In emit mode every stage writes a self-contained shell script instead of
//! talking to the engine. The scripts are equivalent to what the direct path
//! would have executed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DOCKERFILE: &str = "Dockerfile";
pub const BUILD_SCRIPT: &str = "build.sh";
pub const INSTALL_SCRIPT: &str = "install.sh";
pub const RUN_SCRIPT: &str = "run.sh";

/// Write one artifact into `output_dir`, creating the directory if needed
pub fn emit(output_dir: &Path, name: &str, content: &str, executable: bool) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(name);
    fs::write(&path, content)?;
    if executable {
        make_executable(&path)?;
    }
    tracing::info!(path = %path.display(), "wrote script");
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Quote a word for a POSIX shell, leaving plain words untouched
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// `#!/bin/bash` script running `docker <args>` followed by `tail` verbatim
pub fn docker_script(args: &[String], tail: &str) -> String {
    let mut line = String::from("docker");
    for arg in args {
        line.push(' ');
        line.push_str(&shell_quote(arg));
    }
    if !tail.is_empty() {
        line.push(' ');
        line.push_str(tail);
    }
    format!("#!/bin/bash\nset -e\n{}\n", line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("ubuntu:latest"), "ubuntu:latest");
        assert_eq!(shell_quote("/home/me/proj:/proj:rw"), "/home/me/proj:/proj:rw");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_docker_script_keeps_tail_verbatim() {
        let script = docker_script(&["run".into(), "img".into()], "bash -c \"echo $HOME\"");
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("docker run img bash -c \"echo $HOME\"\n"));
    }

    #[test]
    fn test_emit_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let path = emit(&out, RUN_SCRIPT, "#!/bin/bash\n", true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/bash\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
