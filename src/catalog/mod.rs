#[cfg(test)]
mod tests;

/// Default base URL for the public-domain text archive
pub const DEFAULT_ARCHIVE_BASE: &str = "https://www.gutenberg.org/files";

/// A story collection in the built-in catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Book {
    /// Stable numeric ID of the book in the archive
    pub id: u32,
    /// Display title of the collection
    pub title: &'static str,
}

/// The story collections downloaded by `collect`. All are public-domain
/// fairy-tale, fable, and mythology collections.
pub const CATALOG: [Book; 36] = [
    Book { id: 21, title: "Aesop's Fables" },
    Book { id: 2591, title: "Grimm's Fairy Tales" },
    Book { id: 1597, title: "Andersen's Fairy Tales" },
    Book { id: 128, title: "Arabian Nights" },
    Book { id: 2781, title: "Just So Stories" },
    Book { id: 3600, title: "Jataka Tales" },
    Book { id: 503, title: "The Blue Fairy Book" },
    Book { id: 733, title: "The Red Fairy Book" },
    Book { id: 1349, title: "The Green Fairy Book" },
    Book { id: 2785, title: "The Children's Hour" },
    Book { id: 12753, title: "Legends of King Arthur" },
    Book { id: 2786, title: "Stories from Mythology" },
    Book { id: 129, title: "Arabian Nights Volume 2" },
    Book { id: 3326, title: "The Age of Fable" },
    Book { id: 4018, title: "Japanese Fairy Tales" },
    Book { id: 22373, title: "Russian Fairy Tales" },
    Book { id: 1948, title: "A Wonder Book" },
    Book { id: 1376, title: "Tanglewood Tales" },
    Book { id: 3201, title: "Legends of Charlemagne" },
    Book { id: 610, title: "King Arthur Stories" },
    Book { id: 3926, title: "Heroes of Mythology" },
    Book { id: 7439, title: "English Fairy Tales" },
    Book { id: 7438, title: "More English Fairy Tales" },
    Book { id: 1044, title: "Celtic Fairy Tales" },
    Book { id: 1045, title: "More Celtic Fairy Tales" },
    Book { id: 1046, title: "Europa's Fairy Book" },
    Book { id: 7127, title: "Indian Fairy Tales" },
    Book { id: 5314, title: "Household Tales" },
    Book { id: 12814, title: "Philippine Folk Tales" },
    Book { id: 11592, title: "Myths and Legends of All Nations" },
    Book { id: 3435, title: "The Book of the Thousand Nights" },
    Book { id: 2331, title: "The Panchatantra" },
    Book { id: 2509, title: "The Hitopadesha" },
    Book { id: 16981, title: "Old Peter's Russian Tales" },
    Book { id: 2892, title: "Irish Fairy Tales" },
    Book { id: 14230, title: "Welsh Fairy Tales" },
];

impl Book {
    /// Archive URL for the plain-text edition of this book
    #[inline]
    pub fn download_url(&self, archive_base: &str) -> String {
        format!(
            "{}/{}/{}-0.txt",
            archive_base.trim_end_matches('/'),
            self.id,
            self.id
        )
    }

    /// Filesystem-safe stem derived from the title. Apostrophes are
    /// dropped and other non-alphanumeric runs collapse to a single
    /// underscore, so "Grimm's Fairy Tales" becomes
    /// "Grimms_Fairy_Tales".
    #[inline]
    pub fn file_stem(&self) -> String {
        let mut stem = String::new();
        let mut last_was_sep = false;
        for ch in self.title.chars() {
            if ch.is_ascii_alphanumeric() {
                stem.push(ch);
                last_was_sep = false;
            } else if ch == '\'' || ch == '\u{2019}' {
                // apostrophes vanish rather than becoming separators
            } else if !last_was_sep && !stem.is_empty() {
                stem.push('_');
                last_was_sep = true;
            }
        }
        stem.trim_end_matches('_').to_string()
    }

    /// File name the downloaded book is stored under
    #[inline]
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.file_stem())
    }
}

/// The built-in book catalog
#[inline]
pub fn builtin_books() -> &'static [Book] {
    &CATALOG
}
