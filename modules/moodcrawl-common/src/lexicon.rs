// Default emotion lexicon and locale set.
//
// Keywords are grouped by emotion and by the language they are written in,
// so a run can be narrowed to a subset of languages without editing lists.

use crate::types::{Emotion, KeywordTask, Language, LocaleProfile};

const SAD_RU: &[&str] = &[
    "грустный", "грусть", "печаль", "тоска", "депрессия", "одиночество", "одиноко", "слёзы",
    "плачу", "боль", "страдания", "скучаю", "тревога", "усталость", "разбитое сердце",
];
const SAD_KK: &[&str] = &[
    "мұң", "мұңайу", "қайғы", "жалғыздық", "жылау", "ауыр өмір", "жаман күн", "жүрегім ауырды",
    "мен шаршадым", "өмір қиын", "сағыныш",
];
const SAD_EN: &[&str] = &[
    "sad", "sadness", "lonely", "depression", "anxiety", "crying", "broken heart", "miss you",
    "tired", "pain", "hopeless", "heartbreak", "hurt", "bad day",
];

const NEUTRAL_RU: &[&str] = &[
    "новости", "семья", "день", "утро", "жизнь", "работа", "отдых", "путешествия", "еда",
    "выходные", "погода", "друзья", "день рождения", "хобби", "книги",
];
const NEUTRAL_KK: &[&str] = &[
    "өмір", "күнделікті өмір", "сабақ", "оқу", "достар", "отбасы", "демалыс", "тамақ", "жұмыс",
    "ауа райы", "саяхат", "кітап", "бос уақыт", "таң", "кеш",
];
const NEUTRAL_EN: &[&str] = &[
    "life", "work", "school", "friends", "weather", "family", "travel", "morning", "routine",
    "food", "study", "weekend", "day", "evening", "city",
];

const HAPPY_RU: &[&str] = &[
    "счастье", "радость", "улыбка", "любовь", "мотивация", "успех", "вдохновение", "достижения",
    "прекрасный день", "я счастлив", "благодарность",
];
const HAPPY_KK: &[&str] = &[
    "қуаныш", "бақыт", "шабыт", "махаббат", "жетістік", "керемет күн", "рахмет", "ризашылық",
    "мен бақыттымын", "өмір тамаша",
];
const HAPPY_EN: &[&str] = &[
    "happy", "happiness", "joy", "smile", "love", "success", "motivation", "good vibes",
    "grateful", "blessed", "proud", "amazing day", "sunshine",
];

/// Words for one emotion in one language.
pub fn words(emotion: Emotion, language: Language) -> &'static [&'static str] {
    match (emotion, language) {
        (Emotion::Sad, Language::Ru) => SAD_RU,
        (Emotion::Sad, Language::Kk) => SAD_KK,
        (Emotion::Sad, Language::En) => SAD_EN,
        (Emotion::Neutral, Language::Ru) => NEUTRAL_RU,
        (Emotion::Neutral, Language::Kk) => NEUTRAL_KK,
        (Emotion::Neutral, Language::En) => NEUTRAL_EN,
        (Emotion::Happy, Language::Ru) => HAPPY_RU,
        (Emotion::Happy, Language::Kk) => HAPPY_KK,
        (Emotion::Happy, Language::En) => HAPPY_EN,
    }
}

/// Keyword tasks for the given languages, emotions in sad → neutral → happy order.
pub fn keywords_for(languages: &[Language]) -> Vec<KeywordTask> {
    let mut tasks = Vec::new();
    for emotion in Emotion::ALL {
        for language in Language::ALL {
            if !languages.contains(&language) {
                continue;
            }
            tasks.extend(
                words(emotion, language)
                    .iter()
                    .map(|w| KeywordTask::new(emotion, *w, language)),
            );
        }
    }
    tasks
}

/// The full multilingual keyword set.
pub fn default_keywords() -> Vec<KeywordTask> {
    keywords_for(&Language::ALL)
}

pub fn default_locales() -> Vec<LocaleProfile> {
    vec![
        LocaleProfile::new("ru-RU", "ru-RU,ru;q=0.9,en;q=0.8"),
        LocaleProfile::new("kk-KZ", "kk-KZ,kk;q=0.9,ru;q=0.8,en;q=0.7"),
        LocaleProfile::new("en-US", "en-US,en;q=0.9"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_covers_every_list() {
        let all = default_keywords();
        assert_eq!(all.len(), 15 + 11 + 14 + 15 + 15 + 15 + 11 + 10 + 13);
        assert!(all.iter().any(|t| t.keyword == "broken heart" && t.emotion == Emotion::Sad));
        assert!(all.iter().any(|t| t.keyword == "рахмет" && t.language == Language::Kk));
    }

    #[test]
    fn language_filter_keeps_only_requested_languages() {
        let english = keywords_for(&[Language::En]);
        assert_eq!(english.len(), 14 + 15 + 13);
        assert!(english.iter().all(|t| t.language == Language::En));
        assert_eq!(english[0].emotion, Emotion::Sad);
        assert_eq!(english.last().unwrap().emotion, Emotion::Happy);
    }

    #[test]
    fn locales_have_accept_language_headers() {
        let locales = default_locales();
        assert_eq!(locales.len(), 3);
        assert!(locales.iter().all(|l| l.accept_language.starts_with(&l.tag)));
    }
}
