//! Upload tree layout and file moves
//!
//! Uploads are filed under
//! `<root>/<class>/<subject, lowercased, no spaces>/<unit, no spaces>/<Folder>/`
//! with a UUID-prefixed file name, so concurrent uploads never collide.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::models::{ContentType, HierarchyPath};

const MAX_STEM_CHARS: usize = 50;

/// Keep ASCII letters, digits, spaces and hyphens
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty(name: String, fallback: &str) -> String {
    if name.is_empty() {
        format!("unnamed-{}", fallback)
    } else {
        name
    }
}

pub fn class_dir_name(name: &str) -> String {
    non_empty(sanitize_name(name), "class")
}

pub fn subject_dir_name(name: &str) -> String {
    non_empty(sanitize_name(name).to_lowercase().replace(' ', ""), "subject")
}

pub fn unit_dir_name(name: &str) -> String {
    non_empty(sanitize_name(name).replace(' ', ""), "unit")
}

/// Destination directory for an upload of `kind` at `path`
pub fn resource_dir(root: &Path, path: &HierarchyPath, kind: ContentType) -> PathBuf {
    root.join(class_dir_name(&path.class))
        .join(subject_dir_name(&path.subject))
        .join(unit_dir_name(&path.unit))
        .join(kind.folder_name())
}

/// Extract file extension from filename
/// Returns the lowercased extension without the dot, or empty string if none
pub fn get_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| ext.len() <= 10 && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// `<uuid>-<sanitized stem>[.<ext>]`, stripped of anything path-like
pub fn unique_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let extension = get_extension(base);
    let stem = if extension.is_empty() {
        base
    } else {
        base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
    };

    let stem: String = sanitize_name(stem)
        .replace(' ', "_")
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = if stem.is_empty() { "file".to_string() } else { stem };

    if extension.is_empty() {
        format!("{}-{}", Uuid::new_v4(), stem)
    } else {
        format!("{}-{}.{}", Uuid::new_v4(), stem, extension)
    }
}

/// MIME type for a stored file: a fixed table for the formats the catalogue
/// serves, then a guess from the extension.
pub fn mime_type_for(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase);
    let known = match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        _ => "",
    };
    if known.is_empty() {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        known.to_string()
    }
}

/// Reject names that could escape the upload root
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && name != "."
        && !name.contains("..")
}

/// Move a staged file into place: rename, falling back to copy + unlink when
/// the staging area sits on another filesystem.
pub async fn move_into_place(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
        Err(e) => {
            tracing::debug!("rename {:?} -> {:?} failed ({}), copying", from, to, e);
            fs::copy(from, to).await?;
            fs::remove_file(from).await?;
            Ok(())
        }
    }
}

/// Delete a file, logging instead of failing. Returns whether it was removed.
pub async fn remove_file_best_effort(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove {:?}: {}", path, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> HierarchyPath {
        HierarchyPath {
            class: "Class 10".into(),
            subject: "Social Science".into(),
            unit: "The Rise of Nationalism".into(),
            sub_unit: None,
            lesson: "Intro".into(),
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Maths & Stats (Adv.)"), "Maths  Stats Adv");
        assert_eq!(sanitize_name("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_name("Gr\u{e4}de-7"), "Grde-7");
    }

    #[test]
    fn test_resource_dir_layout() {
        let dir = resource_dir(Path::new("/srv/uploads"), &path(), ContentType::Audio);
        assert_eq!(
            dir,
            PathBuf::from("/srv/uploads/Class 10/socialscience/TheRiseofNationalism/Audios")
        );
    }

    #[test]
    fn test_empty_names_fall_back() {
        assert_eq!(subject_dir_name("???"), "unnamed-subject");
        assert_eq!(class_dir_name(""), "unnamed-class");
    }

    #[test]
    fn test_unique_file_name() {
        let name = unique_file_name("../../Chapter 1: Intro.PDF");
        assert!(name.ends_with("-Chapter_1_Intro.pdf"), "{}", name);
        assert!(is_safe_file_name(&name));
        assert_ne!(name, unique_file_name("../../Chapter 1: Intro.PDF"));

        let bare = unique_file_name("README");
        assert!(bare.ends_with("-README"));
        assert_eq!(get_extension("archive.tar.gz"), "gz");
        assert_eq!(get_extension("notes"), "");
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("/a/Lecture.MP3")), "audio/mpeg");
        assert_eq!(mime_type_for(Path::new("/a/book.pdf")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("/a/sheet.csv")), "text/csv");
        assert_eq!(mime_type_for(Path::new("/a/blob")), "application/octet-stream");
    }

    #[test]
    fn test_is_safe_file_name() {
        assert!(is_safe_file_name("abc.pdf"));
        assert!(!is_safe_file_name("../abc.pdf"));
        assert!(!is_safe_file_name("a/b.pdf"));
        assert!(!is_safe_file_name(""));
    }

    #[tokio::test]
    async fn test_move_into_place_creates_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let staged = temp.path().join(".tmp").join("upload.part");
        fs::create_dir_all(staged.parent().unwrap()).await.unwrap();
        fs::write(&staged, b"hello").await.unwrap();

        let dest = temp.path().join("A").join("b").join("C").join("Books").join("x.pdf");
        tokio_test::assert_ok!(move_into_place(&staged, &dest).await);

        assert!(!staged.exists());
        assert_eq!(fs::read(&dest).await.unwrap(), b"hello");
        assert!(remove_file_best_effort(&dest).await);
        assert!(!remove_file_best_effort(&dest).await);
    }
}
