// Forbidden-word moderation over the comma-separated list kept in settings.
// Plain case-insensitive substring matching: no tokenization, no stemming.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordFilter {
    words: Vec<String>,
}

impl WordFilter {
    pub fn from_list(list: &str) -> Self {
        let words = list
            .to_lowercase()
            .split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_allowed(&self, message: &str) -> bool {
        if self.words.is_empty() {
            return true;
        }
        let lowered = message.to_lowercase();
        !self.words.iter().any(|word| lowered.contains(word.as_str()))
    }

    /// Returns `false` when the word is blank or already listed.
    pub fn add(&mut self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        if word.is_empty() || word.contains(',') || self.words.contains(&word) {
            return false;
        }
        self.words.push(word);
        true
    }

    pub fn remove(&mut self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        let before = self.words.len();
        self.words.retain(|w| *w != word);
        self.words.len() != before
    }

    pub fn to_list(&self) -> String {
        self.words.join(",")
    }
}
