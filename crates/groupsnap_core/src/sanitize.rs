/// Display name used when a message carries no poster name.
pub const UNKNOWN_USER: &str = "UnknownUser";

/// Filesystem-safe token for names used in file and directory paths.
///
/// Surrounding whitespace is trimmed; `< > : " / \ | ? *` and `&` become `_`.
pub fn sanitize_name(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect()
}

/// Like [`sanitize_name`], but an absent or blank name yields [`UNKNOWN_USER`].
pub fn sanitize_user_name(input: Option<&str>) -> String {
    match input.map(sanitize_name) {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_USER.to_string(),
    }
}

/// Like [`sanitize_name`], for a single directory component: a name made
/// only of dots (`.`, `..`) would step outside its parent, so each dot
/// becomes `_`.
pub fn sanitize_dir_name(input: &str) -> String {
    let name = sanitize_name(input);
    if is_dot_only(&name) {
        "_".repeat(name.len())
    } else {
        name
    }
}

pub(crate) fn is_dot_only(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c == '.')
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '&')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_forbidden_characters() {
        assert_eq!(sanitize_name("  Tom & Jerry: <best?> "), "Tom _ Jerry_ _best__");
        assert_eq!(sanitize_name(r#"a/b\c|d"e*f"#), "a_b_c_d_e_f");
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let once = sanitize_name(" Road/Trip 2019 ");
        assert_eq!(sanitize_name(&once), once);
    }

    #[test]
    fn dot_only_directory_names_are_neutralized() {
        assert_eq!(sanitize_dir_name(" .. "), "__");
        assert_eq!(sanitize_dir_name("."), "_");
        assert_eq!(sanitize_dir_name("..trip"), "..trip");
        assert_eq!(sanitize_dir_name("a/.."), "a_..");
    }

    #[test]
    fn missing_user_falls_back() {
        assert_eq!(sanitize_user_name(None), UNKNOWN_USER);
        assert_eq!(sanitize_user_name(Some("   ")), UNKNOWN_USER);
        assert_eq!(sanitize_user_name(Some(" Ann ")), "Ann");
    }
}
