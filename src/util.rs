use std::iter::repeat;
use std::path::{Path, PathBuf};

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(&it))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_subpath_wins() {
        let found = find_first_subpath("/config", &["a.yml", "b.yml", "c.yml"], |it| {
            it.ends_with("b.yml") || it.ends_with("c.yml")
        });
        assert_eq!(found, Some(PathBuf::from("/config/b.yml")));
    }

    #[test]
    fn no_match_is_none() {
        let found = find_first_subpath("/config", &["a.yml"], |_| false);
        assert_eq!(found, None);
    }
}
