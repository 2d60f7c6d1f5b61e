//! Indonesian prompt text and the fallbacks shown when generation fails.

pub const ADVICE_SYSTEM: &str = "Anda adalah asisten cerdas bagi pengawas sekolah senior yang mengutamakan kecerdasan emosi dan kepemimpinan transformatif.";

pub const QUOTE_SYSTEM: &str = "Anda adalah mentor bagi para pemimpin pendidikan Indonesia.";

pub const ADVICE_FALLBACK: &str =
    "Teruslah mendampingi dengan hati. Setiap langkah kecil menuju perubahan adalah kemenangan.";

pub const QUOTE_FALLBACK: &str =
    "Kepemimpinan adalah seni memberdayakan orang lain untuk melampaui batas mereka sendiri.";

/// Three short, encouraging suggestions for the principal based on a visit.
pub fn empathetic_advice(findings: &[String], actions: &[String]) -> String {
    format!(
        "Saya adalah seorang pengawas sekolah yang baru saja melakukan kunjungan.\n\
         Temuan saya: {}.\n\
         Rencana aksi: {}.\n\n\
         Berikan 3 poin saran singkat dalam bahasa Indonesia yang sangat empatik dan menyemangati bagi kepala sekolah.\n\
         Gunakan gaya bahasa seorang mentor yang bijak, bukan atasan yang menghakimi.\n\
         Fokus pada pengembangan mindset dan pertumbuhan manusia.",
        findings.join(", "),
        actions.join(", "),
    )
}

pub fn leadership_quote(name: &str, region: &str) -> String {
    format!(
        "Berikan satu kutipan kepemimpinan transformatif yang mendalam dalam Bahasa Indonesia untuk Bapak/Ibu {name}, \
         seorang Pengawas Sekolah di wilayah {region}. Fokus pada semangat pengabdian dan ketulusan mendampingi guru. \
         Maksimal 30 kata."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advice_lists_findings_and_actions() {
        let prompt = empathetic_advice(
            &["Modul ajar belum lengkap".into(), "Kelas padat".into()],
            &["Lokakarya".into()],
        );
        assert!(prompt.contains("Temuan saya: Modul ajar belum lengkap, Kelas padat."));
        assert!(prompt.contains("Rencana aksi: Lokakarya."));
        assert!(prompt.contains("3 poin saran"));
    }

    #[test]
    fn quote_addresses_inspector() {
        let prompt = leadership_quote("Dra. Ratna", "Jakarta Pusat");
        assert!(prompt.contains("Bapak/Ibu Dra. Ratna"));
        assert!(prompt.contains("wilayah Jakarta Pusat."));
        assert!(prompt.ends_with("Maksimal 30 kata."));
    }
}
