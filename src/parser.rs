use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

use log::debug;
use regex::{Regex, RegexBuilder};

use crate::data::Cell;
use crate::map::{Map, MapError};

#[derive(Debug)]
pub enum ParserErr {
    UnknownSymbol(char),
    DuplicateSymbol(char),
    UnknownKey(String),
    EmptyValue(String),
    UnparsedLine(String),
    BadMapInfo(String),
    BadRegex(String),
    UnterminatedLiteral(String),
    MissingHeader,
    EmptyMap,
    Map(MapError),
}

impl Display for ParserErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            ParserErr::UnknownSymbol(c) => write!(f, "Unknown map symbol {:?}", c),
            ParserErr::DuplicateSymbol(c) => {
                write!(f, "Symbol {:?} is mapped to several cell kinds", c)
            }
            ParserErr::UnknownKey(ref k) => write!(f, "Unknown key: {}", k),
            ParserErr::EmptyValue(ref k) => write!(f, "Empty value for key: {}", k),
            ParserErr::UnparsedLine(ref l) => write!(f, "Unparsed line: {}", l),
            ParserErr::BadMapInfo(ref v) => write!(f, "Unable to parse MapInfo value: {}", v),
            ParserErr::BadRegex(ref e) => write!(f, "Bad levelname regex: {}", e),
            ParserErr::UnterminatedLiteral(ref l) => {
                write!(f, "Unable to find end of literal: {}", l)
            }
            ParserErr::MissingHeader => write!(f, "Can't read map settings"),
            ParserErr::EmptyMap => write!(f, "Empty map"),
            ParserErr::Map(ref e) => write!(f, "{}", e),
        }
    }
}

impl Error for ParserErr {}

impl From<MapError> for ParserErr {
    fn from(e: MapError) -> Self {
        ParserErr::Map(e)
    }
}

/// Where the name/info block sits relative to the map rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapInfo {
    None,
    BeforeAmount(usize),
    AfterStartsWith(String),
}

impl MapInfo {
    fn is_before(&self) -> bool {
        match *self {
            MapInfo::BeforeAmount(_) => true,
            _ => false,
        }
    }

    /// Index of the first line that is not part of the map block (for
    /// `After`) or of the info block (for `Before`).
    fn split_index(&self, chunk: &[&str]) -> usize {
        match *self {
            MapInfo::None => chunk.len(),
            MapInfo::BeforeAmount(n) => n.min(chunk.len()),
            MapInfo::AfterStartsWith(ref prefix) => chunk
                .iter()
                .position(|line| starts_with_ignore_case(line, prefix))
                .unwrap_or_else(|| chunk.len()),
        }
    }
}

struct ReaderSettings {
    mapping: HashMap<char, Cell>,
    level_name: Regex,
    map_info: MapInfo,
}

impl ReaderSettings {
    fn new() -> Result<ReaderSettings, ParserErr> {
        Ok(ReaderSettings {
            mapping: HashMap::new(),
            level_name: build_regex(".*")?,
            map_info: MapInfo::None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Level {
    pub name: String,
    pub map: Map,
}

/// Reads a whole level collection: a `key = value` header terminated by
/// `start levels`, then blank-line separated ASCII maps.
pub fn parse_levels(input: &str) -> Result<Vec<Level>, ParserErr> {
    let mut lines = input.lines().map(|l| l.trim_end_matches('\r'));
    let settings = read_settings(&mut lines)?;

    let mut levels = Vec::new();
    loop {
        let chunk = read_chunk(&mut lines);
        if chunk.is_empty() {
            break;
        }
        levels.push(parse_chunk(&chunk, &settings)?);
    }

    if settings.map_info == MapInfo::None {
        for (i, level) in levels.iter_mut().enumerate() {
            level.name = format!("Level {}", i + 1);
        }
    }
    debug!("parsed {} levels", levels.len());
    Ok(levels)
}

fn read_settings<'a, I>(lines: &mut I) -> Result<ReaderSettings, ParserErr>
where
    I: Iterator<Item = &'a str>,
{
    let mut settings = ReaderSettings::new()?;
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.eq_ignore_ascii_case("start levels") {
            return Ok(settings);
        }
        let equal_sign = match line.find('=') {
            Some(at) => at,
            None => return Err(ParserErr::UnparsedLine(line.to_string())),
        };
        let key = line[..equal_sign].trim();
        let value = unquote_value(key, &line[equal_sign + 1..])?;
        read_setting_value(key, &value, &mut settings)?;
    }
    Err(ParserErr::MissingHeader)
}

fn read_setting_value(
    key: &str,
    value: &str,
    settings: &mut ReaderSettings,
) -> Result<(), ParserErr> {
    if key.eq_ignore_ascii_case("mapinfo") {
        settings.map_info = parse_map_info(value)?;
        return Ok(());
    }
    if key.eq_ignore_ascii_case("levelname") {
        settings.level_name = build_regex(value)?;
        return Ok(());
    }

    let cell = if key.eq_ignore_ascii_case("wall") {
        Cell::WALL
    } else if key.eq_ignore_ascii_case("field") {
        Cell::FIELD
    } else if key.eq_ignore_ascii_case("destination") {
        Cell::DESTINATION
    } else if key.eq_ignore_ascii_case("unit") {
        Cell::UNIT
    } else if key.eq_ignore_ascii_case("box") {
        Cell::BOX
    } else if key.eq_ignore_ascii_case("destinationbox") {
        Cell::BOX_DESTINATION
    } else if key.eq_ignore_ascii_case("destinationunit") {
        Cell::UNIT_DESTINATION
    } else {
        return Err(ParserErr::UnknownKey(key.to_string()));
    };

    for c in value.chars() {
        if settings.mapping.insert(c, cell).is_some() {
            return Err(ParserErr::DuplicateSymbol(c));
        }
    }
    Ok(())
}

fn parse_map_info(value: &str) -> Result<MapInfo, ParserErr> {
    let mut rest = value;
    let mut tokens = Vec::new();
    while let Some(token) = next_token(&mut rest)? {
        tokens.push(token);
    }

    let bad = || ParserErr::BadMapInfo(value.to_string());
    match tokens.first() {
        Some(first) if first.eq_ignore_ascii_case("none") => Ok(MapInfo::None),
        Some(first) if first.eq_ignore_ascii_case("before") => {
            if tokens.len() < 3 || !tokens[1].eq_ignore_ascii_case("amount") {
                return Err(bad());
            }
            let amount = tokens[2].parse().map_err(|_| bad())?;
            Ok(MapInfo::BeforeAmount(amount))
        }
        Some(first) if first.eq_ignore_ascii_case("after") => {
            if tokens.len() < 3 || !tokens[1].eq_ignore_ascii_case("starts_with") {
                return Err(bad());
            }
            Ok(MapInfo::AfterStartsWith(tokens[2].clone()))
        }
        _ => Err(bad()),
    }
}

/// Collects non-empty lines until a blank line or the end of input.
fn read_chunk<'a, I>(lines: &mut I) -> Vec<&'a str>
where
    I: Iterator<Item = &'a str>,
{
    let mut chunk = Vec::new();
    for line in lines {
        if line.is_empty() {
            if chunk.is_empty() {
                continue;
            }
            break;
        }
        chunk.push(line);
    }
    chunk
}

fn parse_chunk(chunk: &[&str], settings: &ReaderSettings) -> Result<Level, ParserErr> {
    let at = settings.map_info.split_index(chunk);
    let (mut map_lines, mut info_lines) = chunk.split_at(at);
    if settings.map_info.is_before() {
        std::mem::swap(&mut map_lines, &mut info_lines);
    }

    let mut name = String::new();
    for line in info_lines {
        if let Some(found) = settings.level_name.find(line) {
            name = found.as_str().to_string();
        }
        if !name.is_empty() {
            break;
        }
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut max_columns = 0;
    for line in map_lines {
        let mut row = Vec::with_capacity(line.len());
        for c in line.chars() {
            match settings.mapping.get(&c) {
                Some(&cell) => row.push(cell),
                None => return Err(ParserErr::UnknownSymbol(c)),
            }
        }
        max_columns = max_columns.max(row.len());
        rows.push(row);
    }
    if max_columns == 0 {
        return Err(ParserErr::EmptyMap);
    }
    // short rows are padded with wall
    for row in &mut rows {
        row.resize(max_columns, Cell::WALL);
    }

    Ok(Level {
        name,
        map: Map::from_rows(rows)?,
    })
}

fn build_regex(pattern: &str) -> Result<Regex, ParserErr> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ParserErr::BadRegex(e.to_string()))
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Strips whitespace and one level of surrounding single quotes, which
/// allow values with significant spaces like `field = ' '`.
fn unquote_value(key: &str, value: &str) -> Result<String, ParserErr> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "''" {
        return Err(ParserErr::EmptyValue(key.to_string()));
    }
    if trimmed.len() > 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        return Ok(trimmed[1..trimmed.len() - 1].to_string());
    }
    Ok(trimmed.to_string())
}

/// Whitespace-separated tokens with single-quoted literals; a doubled
/// quote inside a literal stands for the quote itself.
fn next_token(input: &mut &str) -> Result<Option<String>, ParserErr> {
    let rest = input.trim_start();
    if rest.is_empty() {
        *input = rest;
        return Ok(None);
    }

    if let Some(literal) = rest.strip_prefix('\'') {
        let mut token = String::new();
        let mut chars = literal.char_indices().peekable();
        while let Some((at, c)) = chars.next() {
            if c != '\'' {
                token.push(c);
                continue;
            }
            if let Some(&(_, '\'')) = chars.peek() {
                token.push('\'');
                chars.next();
                continue;
            }
            *input = &literal[at + 1..];
            return Ok(Some(token));
        }
        return Err(ParserErr::UnterminatedLiteral(rest.to_string()));
    }

    let end = rest.find(char::is_whitespace).unwrap_or_else(|| rest.len());
    let token = rest[..end].to_string();
    *input = &rest[end..];
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::map_from_ascii;

    const XSB_HEADER: &str = "
# xsb-style symbol mapping
wall = #
field = ' -_'
destination = .
unit = @
box = $
destinationbox = *
destinationunit = +
";

    fn parse(body: &str) -> Result<Vec<Level>, ParserErr> {
        parse_levels(&format!("{}\nstart levels\n\n{}", XSB_HEADER, body))
    }

    #[test]
    fn single_level_default_names() {
        let levels = parse("#####\n#@$.#\n#####\n").unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].name, "Level 1");
        assert_eq!(levels[0].map, map_from_ascii(&["@$."]));
    }

    #[test]
    fn multiple_levels_indexed_names() {
        let levels = parse("#####\n#@$.#\n#####\n\n####\n#@*#\n####\n").unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].name, "Level 1");
        assert_eq!(levels[1].name, "Level 2");
    }

    #[test]
    fn short_rows_are_padded_with_wall() {
        let levels = parse("####\n#@$.####\n####\n").unwrap();
        // the padded area is unreachable and turns into plain wall
        assert_eq!(levels[0].map, map_from_ascii(&["@$."]));
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        match parse("#####\n#@$X#\n#####\n") {
            Err(ParserErr::UnknownSymbol('X')) => {}
            other => panic!("expected UnknownSymbol, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn duplicate_symbol_is_an_error() {
        let input = "wall = #\nfield = '# '\nstart levels\n";
        match parse_levels(input) {
            Err(ParserErr::DuplicateSymbol('#')) => {}
            other => panic!("expected DuplicateSymbol, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_key_and_unparsed_line() {
        match parse_levels("frobnicate = x\nstart levels\n") {
            Err(ParserErr::UnknownKey(ref k)) if k == "frobnicate" => {}
            other => panic!("expected UnknownKey, got {:?}", other.map(|_| ())),
        }
        match parse_levels("no equals sign here\nstart levels\n") {
            Err(ParserErr::UnparsedLine(_)) => {}
            other => panic!("expected UnparsedLine, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_terminator_is_an_error() {
        match parse_levels("wall = #\n") {
            Err(ParserErr::MissingHeader) => {}
            other => panic!("expected MissingHeader, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn map_info_before_amount() {
        let input = format!(
            "{}\nlevelname = 'Level .*'\nmapinfo = Before amount 1\nstart levels\n\n\
             Level one\n#####\n#@$.#\n#####\n",
            XSB_HEADER
        );
        let levels = parse_levels(&input).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].name, "Level one");
        assert_eq!(levels[0].map, map_from_ascii(&["@$."]));
    }

    #[test]
    fn map_info_after_starts_with() {
        let input = format!(
            "{}\nlevelname = '\\d+'\nmapinfo = After starts_with 'Title'\nstart levels\n\n\
             #####\n#@$.#\n#####\nTitle: 42\n",
            XSB_HEADER
        );
        let levels = parse_levels(&input).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].name, "42");
        assert_eq!(levels[0].map, map_from_ascii(&["@$."]));
    }

    #[test]
    fn malformed_map_info() {
        for value in &["Sideways", "Before", "Before quantity 3", "After endswith x"] {
            match parse_levels(&format!("mapinfo = {}\nstart levels\n", value)) {
                Err(ParserErr::BadMapInfo(_)) => {}
                other => panic!(
                    "expected BadMapInfo for {:?}, got {:?}",
                    value,
                    other.map(|_| ())
                ),
            }
        }
    }

    #[test]
    fn quoted_tokens() {
        let mut rest = "After starts_with 'two words'";
        assert_eq!(next_token(&mut rest).unwrap().unwrap(), "After");
        assert_eq!(next_token(&mut rest).unwrap().unwrap(), "starts_with");
        assert_eq!(next_token(&mut rest).unwrap().unwrap(), "two words");
        assert!(next_token(&mut rest).unwrap().is_none());

        let mut escaped = "'it''s here'";
        assert_eq!(next_token(&mut escaped).unwrap().unwrap(), "it's here");

        let mut unterminated = "'oops";
        match next_token(&mut unterminated) {
            Err(ParserErr::UnterminatedLiteral(_)) => {}
            other => panic!("expected UnterminatedLiteral, got {:?}", other),
        }
    }

    #[test]
    fn map_errors_propagate() {
        match parse("#####\n#@$ #\n#####\n") {
            Err(ParserErr::Map(MapError::BoxDestinationMismatch(1, 0))) => {}
            other => panic!("expected map error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn comments_and_blank_lines_in_header() {
        let levels = parse_levels(
            "# a comment\n\nwall = #\nunit = @\nbox = $\ndestination = .\nfield = ' '\n\
             start levels\n\n#####\n#@$.#\n#####\n",
        )
        .unwrap();
        assert_eq!(levels.len(), 1);
    }
}
