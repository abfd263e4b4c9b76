//! `/SKILL.md` front matter: the authoritative source of a skill's name
//! and description.

use serde::Deserialize;

use lattice_core::{LatticeError, Result};

#[derive(Debug, Deserialize)]
pub struct SkillFrontMatter {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Parse the YAML front matter block (`---` ... `---`) at the top of a
/// SKILL.md document.
pub fn parse_front_matter(content: &str) -> Result<SkillFrontMatter> {
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| LatticeError::Rejected("SKILL.md must start with YAML front matter (---)".to_string()))?;
    let end = rest
        .find("\n---")
        .ok_or_else(|| LatticeError::Rejected("SKILL.md front matter is not terminated".to_string()))?;
    let yaml = &rest[..end];

    let front: SkillFrontMatter = serde_yaml::from_str(yaml)
        .map_err(|e| LatticeError::Rejected(format!("invalid SKILL.md front matter: {e}")))?;
    if front.name.trim().is_empty() {
        return Err(LatticeError::Rejected(
            "SKILL.md front matter is missing 'name'".to_string(),
        ));
    }
    Ok(front)
}

/// Split a slash path like `/guides/usage.md` into the artifact's
/// (path, filename) pair. The directory part keeps its leading slash.
pub fn split_file_path(file_path: &str) -> Result<(String, String)> {
    let normalized = if file_path.starts_with('/') {
        file_path.to_string()
    } else {
        format!("/{file_path}")
    };
    let (dir, file) = normalized
        .rsplit_once('/')
        .ok_or_else(|| LatticeError::Rejected(format!("bad file path: {file_path:?}")))?;
    if file.is_empty() {
        return Err(LatticeError::Rejected(format!(
            "file path must name a file: {file_path:?}"
        )));
    }
    let dir = if dir.is_empty() { "/" } else { dir };
    Ok((dir.to_string(), file.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_description() {
        let md = "---\nname: Auth Patterns\ndescription: Authentication notes\n---\n\n# Body\n";
        let front = parse_front_matter(md).unwrap();
        assert_eq!(front.name, "Auth Patterns");
        assert_eq!(front.description, "Authentication notes");
    }

    #[test]
    fn missing_front_matter_rejected() {
        assert!(parse_front_matter("# Just a heading").is_err());
        assert!(parse_front_matter("---\nname: x").is_err());
        assert!(parse_front_matter("---\ndescription: no name\n---\n").is_err());
    }

    #[test]
    fn split_paths() {
        assert_eq!(
            split_file_path("/SKILL.md").unwrap(),
            ("/".to_string(), "SKILL.md".to_string())
        );
        assert_eq!(
            split_file_path("/guides/usage.md").unwrap(),
            ("/guides".to_string(), "usage.md".to_string())
        );
        assert_eq!(
            split_file_path("notes.md").unwrap(),
            ("/".to_string(), "notes.md".to_string())
        );
        assert!(split_file_path("/guides/").is_err());
    }
}
