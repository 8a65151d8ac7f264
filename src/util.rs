use rand::{distributions::Alphanumeric, Rng};

/// Renders whole seconds the way `H:MM:SS` clocks read, prefixing whole
/// days when there are any (`1 day, 2:03:04`).
pub fn format_duration(seconds: u64) -> String {
  let days = seconds / 86_400;
  let hours = seconds % 86_400 / 3600;
  let minutes = seconds % 3600 / 60;
  let secs = seconds % 60;
  let clock = format!("{hours}:{minutes:02}:{secs:02}");

  match days {
    0 => clock,
    1 => format!("1 day, {clock}"),
    n => format!("{n} days, {clock}"),
  }
}

/// `1234567` becomes `1,234,567`.
pub fn group_thousands(n: u64) -> String {
  let digits = n.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  out
}

const TOKEN_LEN: usize = 16;

pub fn random_token() -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(TOKEN_LEN)
    .map(char::from)
    .collect()
}

pub fn is_token(s: &str) -> bool {
  s.len() == TOKEN_LEN && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Makes a title usable as a single path component.
pub fn sanitize_file_stem(title: &str) -> String {
  let cleaned: String = title
    .chars()
    .map(|c| match c {
      '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
      c if c.is_control() => '_',
      c => c,
    })
    .collect();
  let cleaned = cleaned.trim().trim_start_matches('.').trim();

  if cleaned.is_empty() {
    "video".to_string()
  } else {
    cleaned.to_string()
  }
}

/// A `Content-Disposition` value that survives non-ASCII file names.
pub fn attachment_disposition(file_name: &str) -> String {
  let fallback: String = file_name
    .chars()
    .map(|c| match c {
      '"' | '\\' => '_',
      c if c.is_ascii() && !c.is_ascii_control() => c,
      _ => '_',
    })
    .collect();

  let mut encoded = String::new();
  for byte in file_name.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' => {
        encoded.push(byte as char)
      }
      _ => encoded.push_str(&format!("%{byte:02X}")),
    }
  }

  format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
