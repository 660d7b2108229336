//! Line-oriented customer form.
//!
//! Each line is either a field assignment (`name Jane Doe`) or an action
//! (`add`, `search`, `xml`, ...). Notices are printed after every action.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::Result;
use crate::form::{FormController, Notice, NoticeKind};

const HELP: &str = "\
Fields:
  name <text>     set the customer name
  email <text>    set the customer email
  phone <digits>  set the customer phone
  image <path>    select a jpg or png photo
Actions:
  add             add the customer in the form
  search          find a customer by the form's email
  xml             generate XML for the loaded customer
  clear           reset the form
  show            print the form
  help            print this help
  quit            leave the shell";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Name(&'a str),
    Email(&'a str),
    Phone(&'a str),
    Image(&'a str),
    Add,
    Search,
    Xml,
    Clear,
    Show,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse(line: &str) -> Line<'_> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word {
        "" => Line::Empty,
        "name" => Line::Name(rest),
        "email" => Line::Email(rest),
        "phone" => Line::Phone(rest),
        "image" => Line::Image(rest),
        "add" => Line::Add,
        "search" => Line::Search,
        "xml" => Line::Xml,
        "clear" => Line::Clear,
        "show" => Line::Show,
        "help" | "?" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => Line::Unknown(other),
    }
}

fn print_notice(out: &mut impl Write, notice: &Notice) -> Result<()> {
    let tag = match notice.kind {
        NoticeKind::Info => "ok",
        NoticeKind::Error => "error",
    };
    writeln!(out, "[{tag}] {notice}")?;
    Ok(())
}

fn print_form(out: &mut impl Write, controller: &FormController) -> Result<()> {
    let form = controller.form();
    let id = form.id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let image = form
        .image_path
        .as_deref()
        .map_or_else(|| "-".to_string(), |p| p.display().to_string());
    writeln!(out, "ID:    {id}")?;
    writeln!(out, "Name:  {}", form.name)?;
    writeln!(out, "Email: {}", form.email)?;
    writeln!(out, "Phone: {}", form.phone)?;
    writeln!(out, "Image: {image}")?;
    Ok(())
}

/// Run the shell until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading or writing fails, or if an action fails for
/// a reason the form cannot report as a notice.
pub fn run<R: BufRead, W: Write>(
    controller: &mut FormController,
    input: R,
    mut output: W,
) -> Result<()> {
    writeln!(output, "Customer form. Type 'help' for commands.")?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let notice = match parse(&line) {
            Line::Name(value) => {
                controller.set_name(value);
                None
            }
            Line::Email(value) => {
                controller.set_email(value);
                None
            }
            Line::Phone(value) => {
                controller.set_phone(value);
                None
            }
            Line::Image(path) => Some(controller.select_image(Path::new(path))?),
            Line::Add => Some(controller.add_customer()?),
            Line::Search => {
                let notice = controller.search()?;
                if !notice.is_error() {
                    print_form(&mut output, controller)?;
                }
                Some(notice)
            }
            Line::Xml => Some(controller.generate_xml()?),
            Line::Clear => {
                controller.clear();
                None
            }
            Line::Show => {
                print_form(&mut output, controller)?;
                None
            }
            Line::Help => {
                writeln!(output, "{HELP}")?;
                None
            }
            Line::Quit => break,
            Line::Empty => None,
            Line::Unknown(word) => {
                writeln!(output, "Unknown command '{word}'. Type 'help' for commands.")?;
                None
            }
        };

        if let Some(notice) = notice {
            print_notice(&mut output, &notice)?;
        }
        write!(output, "> ")?;
        output.flush()?;
    }

    writeln!(output)?;
    Ok(())
}
