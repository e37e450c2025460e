use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const APP_DIR_NAME: &str = "PhotoTag";

/// Returns the cross-platform directory for application data
pub fn get_app_data_dir() -> PathBuf {
    let home_dir = || PathBuf::from(env::var("HOME").unwrap_or_else(|_| ".".to_string()));

    if cfg!(target_os = "macos") {
        home_dir()
            .join("Library")
            .join("Application Support")
            .join(APP_DIR_NAME)
    } else if cfg!(target_os = "windows") {
        match env::var("APPDATA") {
            Ok(appdata) => PathBuf::from(appdata).join(APP_DIR_NAME),
            // Fallback to current directory
            Err(_) => PathBuf::from(".").join(APP_DIR_NAME),
        }
    } else {
        // Linux and other Unix-like systems
        match env::var("XDG_DATA_HOME") {
            Ok(xdg_data_home) => PathBuf::from(xdg_data_home).join(APP_DIR_NAME),
            Err(_) => home_dir().join(".local").join("share").join(APP_DIR_NAME),
        }
    }
}

/// Ensures the directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<(), std::io::Error> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Returns the path to the application configuration file
pub fn get_config_path() -> PathBuf {
    get_app_data_dir().join("phototag.ini")
}

/// A directory listing for the folder browser.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryListing {
    pub path: String,
    pub parent: Option<String>,
    pub directories: Vec<String>,
}

/// Lists the visible subdirectories of `dir`, sorted by name.
pub fn list_directories(dir: &Path) -> Result<DirectoryListing, std::io::Error> {
    let mut directories: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map_or(false, |ft| ft.is_dir()))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.'))
        .collect();
    directories.sort_by_key(|name| name.to_lowercase());

    Ok(DirectoryListing {
        path: dir.to_string_lossy().to_string(),
        parent: dir.parent().map(|p| p.to_string_lossy().to_string()),
        directories,
    })
}

/// Opens the specified URL in the default browser using native commands
pub fn open_browser(url: &str) -> Result<(), std::io::Error> {
    let os = env::consts::OS;
    match os {
        "macos" => {
            Command::new("open").arg(url).spawn()?;
        }
        "windows" => {
            Command::new("cmd").args(["/C", "start", url]).spawn()?;
        }
        "linux" => {
            Command::new("xdg-open").arg(url).spawn()?;
        }
        _ => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("Unsupported OS: {}", os),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_in_the_app_dir() {
        let config = get_config_path();
        assert_eq!(config.file_name().unwrap(), "phototag.ini");
        assert!(config.starts_with(get_app_data_dir()));
    }

    #[test]
    fn directory_listing_hides_dotfiles_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Summer")).unwrap();
        std::fs::create_dir(dir.path().join("autumn")).unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("photo.jpg"), b"").unwrap();

        let listing = list_directories(dir.path()).unwrap();
        assert_eq!(listing.directories, vec!["autumn", "Summer"]);
        assert!(listing.parent.is_some());
    }

    #[test]
    fn ensure_directory_creates_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_directory_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
