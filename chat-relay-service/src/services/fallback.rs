//! Canned answers for when the bot service cannot be reached.
//!
//! Matching is a case-insensitive substring search over a fixed keyword list;
//! the first keyword found in the message selects the answer.

const PREFIX: &str = "Notbot: ";

const KEYWORDS: &[&str] = &[
    "Studiengänge",
    "Prüfungen",
    "Semester",
    "Stundenplan",
    "Rückmeldefrist",
    "Bibliothek",
    "Studienberatung",
    "Internationale Studierende",
    "International Office",
    "HISinOne",
];

const FAQ: &[(&str, &str)] = &[
    (
        "Studiengänge",
        "Die Hochschule bietet die Studiengänge Informatik, BWL, Maschinenbau u. v. m. an.",
    ),
    (
        "Prüfungen",
        "Über das Online-Portal HISinOne. Die Fristen findest du unter „Prüfungsamt“.",
    ),
    (
        "Semesterbeginn",
        "Das Sommersemester: 1. April, Wintersemester: 1. Oktober.",
    ),
    (
        "Stundenplan",
        "Nach der Einschreibung findest du ihn im Campusportal unter „Mein Studium“.",
    ),
    (
        "Rückmeldefrist",
        "Die Rückmeldung ist bis zum 15. März (SoSe) bzw. 15. September (WiSe) möglich.",
    ),
    ("Bibliothek", "Unter THM.de/bibliothek findest du alle Infos."),
    (
        "Studienberatung",
        "Per Mail an studienberatung@THM.de oder über die Terminbuchung online.",
    ),
    (
        "Internationale Studierende",
        "Ja, z. B. das Buddy-Programm. Infos unter „International Office“.",
    ),
];

const NO_KEYWORD: &str = "Bitte stelle eine präzisere Frage oder nenne ein Stichwort.";
const NO_ANSWER: &str = "Keine passende Information gefunden.";

/// Answer for `message` without the `Notbot:` prefix.
pub fn lookup(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    let Some(keyword) = KEYWORDS
        .iter()
        .find(|k| lowered.contains(&k.to_lowercase()))
    else {
        return NO_KEYWORD;
    };

    let keyword = keyword.to_lowercase();
    FAQ.iter()
        .find(|(topic, _)| topic.to_lowercase().contains(&keyword))
        .map(|(_, answer)| *answer)
        .unwrap_or(NO_ANSWER)
}

/// Reply text shown to the user, marked as not coming from the bot.
pub fn canned_reply(message: &str) -> String {
    format!("{}{}", PREFIX, lookup(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keyword_case_insensitively() {
        assert_eq!(
            lookup("wo finde ich den STUNDENPLAN?"),
            "Nach der Einschreibung findest du ihn im Campusportal unter „Mein Studium“."
        );
    }

    #[test]
    fn semester_resolves_to_semesterbeginn() {
        assert_eq!(
            lookup("Wann beginnt das Semester?"),
            "Das Sommersemester: 1. April, Wintersemester: 1. Oktober."
        );
    }

    #[test]
    fn keyword_without_answer() {
        assert_eq!(lookup("Login bei HISinOne"), NO_ANSWER);
    }

    #[test]
    fn no_keyword_asks_for_precision() {
        assert_eq!(canned_reply("Hallo"), format!("Notbot: {}", NO_KEYWORD));
    }
}
