use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(chunk_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    match (chunk_home, home_dir) {
        (Some(chunk_home), _) => Some(chunk_home.join(".env")),
        (None, Some(home)) => Some(home.join(".chunk-reconcile/.env")),
        (None, None) => None,
    }
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("CHUNK_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_uses_chunk_home_directly() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/workspace/chunk")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(got, Some(PathBuf::from("/workspace/chunk/.env")));
    }

    #[test]
    fn fallback_uses_home_when_chunk_home_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/.chunk-reconcile/.env")));
    }
}
