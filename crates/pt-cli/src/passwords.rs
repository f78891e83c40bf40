//! Password caching for searches across many encrypted notes.

use std::path::Path;

use pt_crypto::NoteKey;
use pt_store::PasswordProvider;
use tracing::debug;

/// Asks once and reuses the answer until it is rejected, then asks again.
pub struct CachingPassword<F> {
    prompt: F,
    cached: Option<NoteKey>,
}

impl<F> CachingPassword<F>
where
    F: FnMut(&Path) -> Option<NoteKey>,
{
    pub fn new(prompt: F) -> Self {
        Self {
            prompt,
            cached: None,
        }
    }
}

impl<F> PasswordProvider for CachingPassword<F>
where
    F: FnMut(&Path) -> Option<NoteKey>,
{
    fn password_for(&mut self, path: &Path) -> Option<NoteKey> {
        if let Some(key) = &self.cached {
            return Some(key.clone());
        }
        let key = (self.prompt)(path)?;
        self.cached = Some(key.clone());
        Some(key)
    }

    fn rejected(&mut self, path: &Path) {
        debug!(path = %path.display(), "dropping cached password");
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_answer() {
        let mut asked = 0;
        let mut provider = CachingPassword::new(|_: &Path| {
            asked += 1;
            Some(NoteKey::from_password("pw"))
        });
        for name in ["a.chi", "b.chi", "c.aes.zip"] {
            assert_eq!(
                provider.password_for(Path::new(name)).unwrap().as_bytes(),
                b"pw"
            );
        }
        drop(provider);
        assert_eq!(asked, 1);
    }

    #[test]
    fn test_asks_again_after_rejection() {
        let mut asked = Vec::new();
        let mut provider = CachingPassword::new(|p: &Path| {
            asked.push(p.to_path_buf());
            Some(NoteKey::from_password("pw"))
        });
        provider.password_for(Path::new("a.chi"));
        provider.rejected(Path::new("a.chi"));
        provider.password_for(Path::new("b.chi"));
        provider.password_for(Path::new("c.chi"));
        drop(provider);
        assert_eq!(asked, [Path::new("a.chi"), Path::new("b.chi")]);
    }

    #[test]
    fn test_no_answer_is_not_cached() {
        let mut answers = vec![Some(NoteKey::from_password("pw")), None].into_iter();
        let mut provider = CachingPassword::new(|_: &Path| answers.next_back().flatten());
        assert!(provider.password_for(Path::new("a.chi")).is_none());
        assert!(provider.password_for(Path::new("b.chi")).is_some());
        assert!(provider.password_for(Path::new("c.chi")).is_some());
    }
}
