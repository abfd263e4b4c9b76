//! Prompt assembly for the skill-learn agent.

use lattice_store::types::SkillInfo;

pub const SKILL_LEARNER_SYSTEM: &str = "\
You maintain a library of reusable skills for a learning space. Each run \
you receive a Task Analysis (a distilled summary of one finished task) and \
the Available Skills currently in the library.

- Read existing skills (get_skill, get_skill_file) before writing: prefer \
refining an existing skill over creating a near-duplicate.
- A new skill (create_skill) takes a full SKILL.md document whose YAML \
front matter carries `name` and `description`; that file stays the \
authoritative source of both.
- Edit skill files with create_skill_file, str_replace_skill_file, and \
delete_skill_file. /SKILL.md itself can be edited but never deleted.
- Call report_thinking before other tool calls to explain your direction.
- Call finish when the library reflects the lesson. Doing nothing is a \
valid outcome for analyses that add nothing new.";

/// Two sections: the distilled context verbatim, then the library listing.
pub fn pack_skill_learner_input(distilled_context: &str, skills: &str) -> String {
    format!(
        "{distilled_context}\n\n## Available Skills\n{skills}\n\nToday's date: {}",
        chrono::Utc::now().format("%Y-%m-%d")
    )
}

pub fn render_available_skills(skills: &[SkillInfo]) -> String {
    if skills.is_empty() {
        return "(No skills in this learning space yet)".to_string();
    }
    skills
        .iter()
        .map(|s| {
            format!(
                "- **{}**: {} (files: {})",
                s.name,
                s.description,
                s.file_paths.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn packed_input_has_both_sections_and_date() {
        let packed = pack_skill_learner_input(
            "## Task Analysis (Success)\n**Goal:** Fix bug",
            "- **auth-patterns**: Authentication handling (files: /SKILL.md)",
        );
        assert!(packed.contains("## Task Analysis (Success)"));
        assert!(packed.contains("## Available Skills"));
        assert!(packed.contains("auth-patterns"));
        assert!(packed.contains("Today's date:"));
    }

    #[test]
    fn empty_library_renders_placeholder() {
        assert_eq!(
            render_available_skills(&[]),
            "(No skills in this learning space yet)"
        );
        let skill = SkillInfo {
            id: Uuid::new_v4(),
            disk_id: Uuid::new_v4(),
            name: "auth".to_string(),
            description: "notes".to_string(),
            file_paths: vec!["/SKILL.md".to_string()],
        };
        assert!(render_available_skills(&[skill]).contains("- **auth**: notes"));
    }
}
