use super::*;
use std::collections::HashSet;

#[test]
fn catalog_has_distinct_ids() {
    let ids: HashSet<u32> = builtin_books().iter().map(|book| book.id).collect();
    assert_eq!(ids.len(), builtin_books().len());
}

#[test]
fn catalog_has_distinct_file_names() {
    let names: HashSet<String> = builtin_books()
        .iter()
        .map(|book| book.file_name())
        .collect();
    assert_eq!(names.len(), builtin_books().len());
}

#[test]
fn download_url_format() {
    let book = Book {
        id: 2591,
        title: "Grimm's Fairy Tales",
    };
    assert_eq!(
        book.download_url(DEFAULT_ARCHIVE_BASE),
        "https://www.gutenberg.org/files/2591/2591-0.txt"
    );

    // Trailing slashes on the base collapse
    assert_eq!(
        book.download_url("http://localhost:9000/"),
        "http://localhost:9000/2591/2591-0.txt"
    );
}

#[test]
fn file_stem_sanitization() {
    let book = Book {
        id: 2591,
        title: "Grimm's Fairy Tales",
    };
    assert_eq!(book.file_stem(), "Grimms_Fairy_Tales");
    assert_eq!(book.file_name(), "Grimms_Fairy_Tales.txt");

    let book = Book {
        id: 1,
        title: "Myths & Legends / Volume 1",
    };
    assert_eq!(book.file_stem(), "Myths_Legends_Volume_1");

    let book = Book {
        id: 1,
        title: "...Leading Dots",
    };
    assert_eq!(book.file_stem(), "Leading_Dots");
}

#[test]
fn catalog_is_nonempty_and_titled() {
    assert_eq!(builtin_books().len(), 36);
    assert!(builtin_books().iter().all(|book| !book.title.is_empty()));
    assert!(builtin_books().iter().all(|book| book.id > 0));
}
