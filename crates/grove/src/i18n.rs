use serde::Serialize;

/// Label text for generated pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labels {
    pub locale: &'static str,
    pub home: &'static str,
    pub tag: &'static str,
    pub tag_index: &'static str,
    pub folder: &'static str,
    pub items_under_folder_one: &'static str,
    pub items_under_folder_many: &'static str,
    pub items_under_tag_one: &'static str,
    pub items_under_tag_many: &'static str,
    pub backlinks: &'static str,
    pub no_backlinks: &'static str,
    pub show_more: &'static str,
    pub last_fewnotes: &'static str,
}

const EN_US: Labels = Labels {
    locale: "en-US",
    home: "Home",
    tag: "Tag",
    tag_index: "Tag Index",
    folder: "Folder",
    items_under_folder_one: "1 item under this folder.",
    items_under_folder_many: "{count} items under this folder.",
    items_under_tag_one: "1 item with this tag.",
    items_under_tag_many: "{count} items with this tag.",
    backlinks: "Backlinks",
    no_backlinks: "No backlinks found",
    show_more: "Show {count} more",
    last_fewnotes: "Last {count} notes",
};

const FR_FR: Labels = Labels {
    locale: "fr-FR",
    home: "Accueil",
    tag: "Étiquette",
    tag_index: "Index des étiquettes",
    folder: "Dossier",
    items_under_folder_one: "1 élément sous ce dossier.",
    items_under_folder_many: "{count} éléments sous ce dossier.",
    items_under_tag_one: "1 élément avec cette étiquette.",
    items_under_tag_many: "{count} éléments avec cette étiquette.",
    backlinks: "Liens retour",
    no_backlinks: "Aucun lien retour trouvé",
    show_more: "Afficher {count} de plus",
    last_fewnotes: "Les {count} dernières notes",
};

const DE_DE: Labels = Labels {
    locale: "de-DE",
    home: "Startseite",
    tag: "Tag",
    tag_index: "Tag-Übersicht",
    folder: "Ordner",
    items_under_folder_one: "1 Datei in diesem Ordner.",
    items_under_folder_many: "{count} Dateien in diesem Ordner.",
    items_under_tag_one: "1 Datei mit diesem Tag.",
    items_under_tag_many: "{count} Dateien mit diesem Tag.",
    backlinks: "Backlinks",
    no_backlinks: "Keine Backlinks gefunden",
    show_more: "{count} weitere anzeigen",
    last_fewnotes: "Die letzten {count} Notizen",
};

const ES_ES: Labels = Labels {
    locale: "es-ES",
    home: "Inicio",
    tag: "Etiqueta",
    tag_index: "Índice de etiquetas",
    folder: "Carpeta",
    items_under_folder_one: "1 elemento en esta carpeta.",
    items_under_folder_many: "{count} elementos en esta carpeta.",
    items_under_tag_one: "1 elemento con esta etiqueta.",
    items_under_tag_many: "{count} elementos con esta etiqueta.",
    backlinks: "Enlaces de retroceso",
    no_backlinks: "No se han encontrado enlaces traseros",
    show_more: "Mostrar {count} más",
    last_fewnotes: "Últimas {count} notas",
};

const TABLES: &[&Labels] = &[&EN_US, &FR_FR, &DE_DE, &ES_ES];

impl Labels {
    /// Exact match first, then language only, then `en-US`.
    pub fn for_locale(locale: &str) -> &'static Labels {
        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        TABLES
            .iter()
            .find(|labels| labels.locale.eq_ignore_ascii_case(locale))
            .or_else(|| {
                TABLES.iter().find(|labels| {
                    labels
                        .locale
                        .split('-')
                        .next()
                        .is_some_and(|candidate| candidate.eq_ignore_ascii_case(language))
                })
            })
            .copied()
            .unwrap_or(&EN_US)
    }

    pub fn tag_title(&self, tag: &str) -> String {
        format!("{}: {}", self.tag, tag)
    }

    pub fn folder_title(&self, folder: &str) -> String {
        format!("{}: {}", self.folder, folder)
    }

    pub fn items_under_folder(&self, count: usize) -> String {
        pluralize(self.items_under_folder_one, self.items_under_folder_many, count)
    }

    pub fn items_under_tag(&self, count: usize) -> String {
        pluralize(self.items_under_tag_one, self.items_under_tag_many, count)
    }

    pub fn show_more(&self, count: usize) -> String {
        self.show_more.replace("{count}", &count.to_string())
    }

    pub fn last_notes(&self, count: usize) -> String {
        self.last_fewnotes.replace("{count}", &count.to_string())
    }
}

fn pluralize(one: &str, many: &str, count: usize) -> String {
    if count == 1 {
        one.to_string()
    } else {
        many.replace("{count}", &count.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_lookup_and_fallback() {
        assert_eq!(Labels::for_locale("fr-FR").locale, "fr-FR");
        assert_eq!(Labels::for_locale("de_AT").locale, "de-DE");
        assert_eq!(Labels::for_locale("ES-es").locale, "es-ES");
        assert_eq!(Labels::for_locale("ja-JP").locale, "en-US");
    }

    #[test]
    fn test_counts_are_pluralized() {
        let labels = Labels::for_locale("en-US");
        assert_eq!(labels.items_under_folder(1), "1 item under this folder.");
        assert_eq!(labels.items_under_folder(3), "3 items under this folder.");
        assert_eq!(labels.items_under_tag(0), "0 items with this tag.");
        assert_eq!(labels.tag_title("rust"), "Tag: rust");
    }
}
