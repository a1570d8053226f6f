use heapless::String;

use crate::error::Error;

pub const OK_TERMINATION: &[u8] = b"\r\nOK\r\n";
pub const ERROR_TERMINATION: &[u8] = b"\r\nERROR\r\n";

/// Outcome of a synchronous command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseResult {
    Ok,
    /// The modem answered `ERROR`.
    Error,
    /// The response did not fit the supplied buffer.
    BufferOverflow,
    Timeout,
    /// Bytes were lost between the UART and the ring buffer.
    SerialReadError,
    None,
}

impl ResponseResult {
    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }

    pub fn ok(self) -> Result<(), Error> {
        match self {
            Self::Ok => Ok(()),
            other => Err(other.into()),
        }
    }
}

impl Default for ResponseResult {
    fn default() -> Self {
        Self::None
    }
}

/// Classify `data` by the terminator it ends in.
///
/// Returns the outcome and the length of `data` without the terminator.
pub(crate) fn match_terminator(data: &[u8]) -> Option<(ResponseResult, usize)> {
    if data.ends_with(OK_TERMINATION) {
        Some((ResponseResult::Ok, data.len() - OK_TERMINATION.len()))
    } else if data.ends_with(ERROR_TERMINATION) {
        Some((ResponseResult::Error, data.len() - ERROR_TERMINATION.len()))
    } else {
        None
    }
}

/// Sliding window over the last bytes of a response, for readers that do not
/// keep the response itself.
#[derive(Debug, Default)]
pub(crate) struct TerminatorWindow {
    window: [u8; ERROR_TERMINATION.len()],
    len: usize,
}

impl TerminatorWindow {
    pub(crate) fn push(&mut self, byte: u8) -> Option<ResponseResult> {
        if self.len == self.window.len() {
            self.window.copy_within(1.., 0);
            self.len -= 1;
        }
        self.window[self.len] = byte;
        self.len += 1;

        let data = &self.window[..self.len];
        if data.ends_with(b"\r\n") {
            match_terminator(data).map(|(result, _)| result)
        } else {
            None
        }
    }
}

/// Extract the `index`th (1-based) comma separated field of a response line.
///
/// With `start_character`, everything up to and including its first
/// occurrence is skipped, along with any spaces after it, so
/// `+CEREG: 2,1,,,0` yields `2`, `1`, `""`, `""` and `0`. Empty fields are
/// kept, commas inside double quotes do not split, and the field list ends at
/// the first line terminator. Without `start_character`, leading line breaks
/// are skipped first.
pub fn extract_field(
    response: &str,
    index: usize,
    start_character: Option<char>,
) -> Result<&str, Error> {
    if index == 0 {
        return Err(Error::FieldNotFound);
    }

    let data = match start_character {
        Some(c) => {
            let start = response.find(c).ok_or(Error::FieldNotFound)?;
            response[start + c.len_utf8()..].trim_start_matches(' ')
        }
        None => response.trim_start_matches(['\r', '\n']),
    };
    let data = match data.find(['\r', '\n']) {
        Some(end) => &data[..end],
        None => data,
    };

    Fields::new(data).nth(index - 1).ok_or(Error::FieldNotFound)
}

/// [`extract_field`] copied into an owned string of at most `N` bytes.
pub fn extract_field_into<const N: usize>(
    response: &str,
    index: usize,
    start_character: Option<char>,
) -> Result<String<N>, Error> {
    let field = extract_field(response, index, start_character)?;
    String::try_from(field).map_err(|_| Error::BufferTooSmall)
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

struct Fields<'a> {
    rest: Option<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(data: &'a str) -> Self {
        Self { rest: Some(data) }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        let mut quoted = false;
        for (i, c) in rest.char_indices() {
            match c {
                '"' => quoted = !quoted,
                ',' if !quoted => {
                    self.rest = Some(&rest[i + 1..]);
                    return Some(&rest[..i]);
                }
                _ => {}
            }
        }
        self.rest = None;
        Some(rest)
    }
}
