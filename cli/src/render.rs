//! Plain-text rendering of dashboard views.

use ula_core::{
    Admin, ApiError, Book, Collection, ErrorKind, Screen, Student, Unit, ViewState,
};

/// A loaded value that can be printed as a heading plus one line per child.
pub trait Listing {
    fn heading(&self) -> String;
    fn rows(&self) -> Vec<String>;
    /// Shown instead of rows when there are no children.
    fn empty_hint(&self) -> &'static str;
}

impl Listing for Vec<Student> {
    fn heading(&self) -> String {
        format!("Students ({})", self.len())
    }

    fn rows(&self) -> Vec<String> {
        self.iter()
            .map(|s| {
                let paid = if s.payment.status { "paid" } else { "unpaid" };
                format!("{}  {}  {}  {paid}", s.id, s.full_name(), s.phone_number)
            })
            .collect()
    }

    fn empty_hint(&self) -> &'static str {
        "No students found."
    }
}

impl Listing for Vec<Admin> {
    fn heading(&self) -> String {
        format!("Admins ({})", self.len())
    }

    fn rows(&self) -> Vec<String> {
        self.iter()
            .map(|a| format!("{}  {}  {}", a.id, a.full_name(), a.role))
            .collect()
    }

    fn empty_hint(&self) -> &'static str {
        "No admins found."
    }
}

impl Listing for Vec<Collection> {
    fn heading(&self) -> String {
        format!("Collections ({})", self.len())
    }

    fn rows(&self) -> Vec<String> {
        self.iter()
            .map(|c| format!("{}  {}  ({} books)", c.id, c.name, c.books.len()))
            .collect()
    }

    fn empty_hint(&self) -> &'static str {
        "No collections yet. Create one with `create-collection`."
    }
}

impl Listing for Collection {
    fn heading(&self) -> String {
        format!("Collection {} [{}]\nimage: {}", self.name, self.id, self.image)
    }

    fn rows(&self) -> Vec<String> {
        self.books
            .iter()
            .map(|book| {
                let levels: Vec<&str> = book.levels.iter().map(|l| l.label.as_str()).collect();
                if levels.is_empty() {
                    format!("{}  {}", book.id, book.name)
                } else {
                    format!("{}  {}  [{}]", book.id, book.name, levels.join(", "))
                }
            })
            .collect()
    }

    fn empty_hint(&self) -> &'static str {
        "No books yet. Add one with `create-book`."
    }
}

impl Listing for Book {
    fn heading(&self) -> String {
        format!("Book {} [{}]", self.name, self.id)
    }

    fn rows(&self) -> Vec<String> {
        let mut rows = Vec::new();
        for level in &self.levels {
            rows.push(format!("{} [{}]", level.label, level.id));
            for unit in &level.units {
                rows.push(format!(
                    "  - {} [{}] ({} audio)",
                    unit.title,
                    unit.id,
                    unit.audios.len()
                ));
            }
        }
        rows
    }

    fn empty_hint(&self) -> &'static str {
        "No levels yet. Add one with `add-level`."
    }
}

impl Listing for Unit {
    fn heading(&self) -> String {
        format!("Unit {} [{}]", self.title, self.id)
    }

    fn rows(&self) -> Vec<String> {
        self.audios
            .iter()
            .map(|audio| format!("{}  {}", audio.label, audio.file))
            .collect()
    }

    fn empty_hint(&self) -> &'static str {
        "No audio tracks yet. Add one with `add-audio`."
    }
}

impl Listing for Screen {
    fn heading(&self) -> String {
        match self {
            Screen::Students(v) => v.heading(),
            Screen::Admins(v) => v.heading(),
            Screen::Collections(v) => v.heading(),
            Screen::Collection(v) => v.heading(),
            Screen::Book(v) => v.heading(),
            Screen::Unit(v) => v.heading(),
        }
    }

    fn rows(&self) -> Vec<String> {
        match self {
            Screen::Students(v) => v.rows(),
            Screen::Admins(v) => v.rows(),
            Screen::Collections(v) => v.rows(),
            Screen::Collection(v) => v.rows(),
            Screen::Book(v) => v.rows(),
            Screen::Unit(v) => v.rows(),
        }
    }

    fn empty_hint(&self) -> &'static str {
        match self {
            Screen::Students(v) => v.empty_hint(),
            Screen::Admins(v) => v.empty_hint(),
            Screen::Collections(v) => v.empty_hint(),
            Screen::Collection(v) => v.empty_hint(),
            Screen::Book(v) => v.empty_hint(),
            Screen::Unit(v) => v.empty_hint(),
        }
    }
}

pub fn view<V: Listing>(state: &ViewState<V>) -> String {
    match state {
        ViewState::Loading => "Loading...\n".to_string(),
        ViewState::Error(err) => failure(err),
        ViewState::Empty(value) => format!("{}\n  {}\n", value.heading(), value.empty_hint()),
        ViewState::Populated(value) => {
            let mut out = value.heading();
            out.push('\n');
            for row in value.rows() {
                out.push_str("  ");
                out.push_str(&row);
                out.push('\n');
            }
            out
        }
    }
}

pub fn failure(err: &ApiError) -> String {
    match err.kind() {
        ErrorKind::Network => format!("Could not reach the server: {err}\n"),
        ErrorKind::Rejected => format!("Request rejected: {err}\n"),
        ErrorKind::Unexpected => format!("Unexpected response: {err}\n"),
    }
}
