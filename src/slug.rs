use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

/// Map an accented Latin letter to its ASCII base; other characters pass through.
fn fold_accent(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ą' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' | 'Ā' | 'Ą' => 'A',
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' | 'Ē' | 'Ę' | 'Ě' => 'E',
        'í' | 'ì' | 'î' | 'ï' | 'ī' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' | 'Ī' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ő' | 'ō' | 'ø' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ő' | 'Ō' | 'Ø' => 'O',
        'ú' | 'ù' | 'û' | 'ü' | 'ű' | 'ū' | 'ů' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ű' | 'Ū' | 'Ů' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        'ç' | 'č' | 'ć' => 'c',
        'Ç' | 'Č' | 'Ć' => 'C',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'š' | 'ś' => 's',
        'Š' | 'Ś' => 'S',
        'ž' | 'ź' | 'ż' => 'z',
        'Ž' | 'Ź' | 'Ż' => 'Z',
        'ř' => 'r',
        'Ř' => 'R',
        'ł' => 'l',
        'Ł' => 'L',
        'ď' => 'd',
        'Ď' => 'D',
        'ť' => 't',
        'Ť' => 'T',
        c if c.is_ascii() => c,
        _ => return None,
    };
    Some(folded)
}

/// URL-safe slug: ASCII-folded, lowercase, words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let ascii: String = text.chars().filter_map(fold_accent).collect();
    let lowered = ascii.to_lowercase();
    let cleaned = DISALLOWED.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// First of `base`, `base-2`, `base-3`, ... for which `exists` returns false.
pub fn unique_slug<F>(base: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !exists(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn folds_hungarian_accents() {
        assert_eq!(slugify("Szemes kávé"), "szemes-kave");
        assert_eq!(slugify("Őrölt  Ünnepi   Keverék"), "orolt-unnepi-keverek");
    }

    #[test]
    fn drops_punctuation_and_collapses_separators() {
        assert_eq!(slugify("  Nescafé 3in1 -- Classic (10 x 17g)!  "), "nescafe-3in1-classic-10-x-17g");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken: HashSet<&str> = ["espresso", "espresso-2"].into_iter().collect();
        assert_eq!(unique_slug("espresso", |s| taken.contains(s)), "espresso-3");
        assert_eq!(unique_slug("lungo", |s| taken.contains(s)), "lungo");
    }
}
