//! Combinators that build one intensity source out of several.
//!
//! All work happens per query; nothing is cached between calls.

use super::{IntensityProvider, IntensitySample};

/// Queries every provider in order and merges the results.
///
/// When two providers report the same field, the later provider wins.
pub struct StackedIntensityProvider {
    providers: Vec<Box<dyn IntensityProvider>>,
}

impl StackedIntensityProvider {
    pub fn new(providers: Vec<Box<dyn IntensityProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: Box<dyn IntensityProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl IntensityProvider for StackedIntensityProvider {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        let mut sample = IntensitySample::new();
        for provider in &self.providers {
            sample.overlay(provider.nearest(lon, lat));
        }
        sample
    }
}

/// Fills a missing field from the first fallback field that is present
pub struct AliasIntensityProvider<P> {
    inner: P,
    aliases: Vec<(String, Vec<String>)>,
}

impl<P: IntensityProvider> AliasIntensityProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            aliases: Vec::new(),
        }
    }

    /// Serve `field` from `fallbacks` (tried in order) when it is absent
    pub fn alias<I, S>(mut self, field: impl Into<String>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .push((field.into(), fallbacks.into_iter().map(Into::into).collect()));
        self
    }
}

impl<P: IntensityProvider> IntensityProvider for AliasIntensityProvider<P> {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        let mut sample = self.inner.nearest(lon, lat);
        for (field, fallbacks) in &self.aliases {
            if sample.contains(field) {
                continue;
            }
            let found = fallbacks.iter().find_map(|fallback| {
                let value = sample.value(fallback)?;
                let unit = sample.unit(fallback).unwrap_or_default().to_string();
                Some((value, unit))
            });
            if let Some((value, unit)) = found {
                sample.insert(field.clone(), value, unit);
            }
        }
        sample
    }
}

type ConversionFn = dyn Fn(f64, &str) -> (f64, String) + Send + Sync;

/// Derives a new field from an existing one; the source field is kept
pub struct ConversionIntensityProvider<P> {
    inner: P,
    source_field: String,
    target_field: String,
    convert: Box<ConversionFn>,
}

impl<P: IntensityProvider> ConversionIntensityProvider<P> {
    pub fn new<F>(
        inner: P,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        convert: F,
    ) -> Self
    where
        F: Fn(f64, &str) -> (f64, String) + Send + Sync + 'static,
    {
        Self {
            inner,
            source_field: source_field.into(),
            target_field: target_field.into(),
            convert: Box::new(convert),
        }
    }
}

impl<P: IntensityProvider> IntensityProvider for ConversionIntensityProvider<P> {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        let mut sample = self.inner.nearest(lon, lat);
        if let Some(value) = sample.value(&self.source_field) {
            let unit = sample.unit(&self.source_field).unwrap_or_default();
            let (value, unit) = (self.convert)(value, unit);
            sample.insert(self.target_field.clone(), value, unit);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider returning the same sample everywhere
    struct Fixed(IntensitySample);

    impl IntensityProvider for Fixed {
        fn nearest(&self, _lon: f64, _lat: f64) -> IntensitySample {
            self.0.clone()
        }
    }

    #[test]
    fn test_stacked_merges_disjoint_fields() {
        let stacked = StackedIntensityProvider::new(vec![
            Box::new(Fixed(IntensitySample::new().with("PGA", 0.2, "g"))),
            Box::new(Fixed(IntensitySample::new().with("MWH", 3.0, "m"))),
        ]);

        let sample = stacked.nearest(0.0, 0.0);

        assert_eq!(sample.value("PGA"), Some(0.2));
        assert_eq!(sample.value("MWH"), Some(3.0));
    }

    #[test]
    fn test_stacked_last_wins() {
        let stacked = StackedIntensityProvider::new(vec![
            Box::new(Fixed(IntensitySample::new().with("PGA", 0.2, "g"))),
            Box::new(Fixed(IntensitySample::new().with("PGA", 0.5, "m/s2"))),
        ]);

        let sample = stacked.nearest(0.0, 0.0);

        assert_eq!(sample.value("PGA"), Some(0.5));
        assert_eq!(sample.unit("PGA"), Some("m/s2"));
    }

    #[test]
    fn test_alias_uses_first_present_fallback() {
        let inner = Fixed(
            IntensitySample::new()
                .with("pga_g", 0.3, "g")
                .with("PGA_legacy", 0.9, "g"),
        );
        let provider = AliasIntensityProvider::new(inner).alias("PGA", ["missing", "pga_g", "PGA_legacy"]);

        let sample = provider.nearest(0.0, 0.0);

        assert_eq!(sample.value("PGA"), Some(0.3));
        assert_eq!(sample.unit("PGA"), Some("g"));
        assert_eq!(sample.value("pga_g"), Some(0.3));
    }

    #[test]
    fn test_alias_keeps_existing_field() {
        let inner = Fixed(IntensitySample::new().with("PGA", 0.1, "g").with("pga_g", 0.3, "g"));
        let provider = AliasIntensityProvider::new(inner).alias("PGA", ["pga_g"]);
        assert_eq!(provider.nearest(0.0, 0.0).value("PGA"), Some(0.1));
    }

    #[test]
    fn test_alias_without_any_fallback_leaves_field_absent() {
        let provider =
            AliasIntensityProvider::new(Fixed(IntensitySample::new())).alias("PGA", ["pga"]);
        assert!(!provider.nearest(0.0, 0.0).contains("PGA"));
    }

    #[test]
    fn test_conversion_adds_field() {
        // Ash thickness in mm to load in kPa at 1000 kg/m3
        let inner = Fixed(IntensitySample::new().with("THICKNESS", 100.0, "mm"));
        let provider = ConversionIntensityProvider::new(inner, "THICKNESS", "LOAD", |mm, _| {
            (mm / 1000.0 * 1000.0 * 9.81 / 1000.0, "kPa".to_string())
        });

        let sample = provider.nearest(0.0, 0.0);

        assert_eq!(sample.value("THICKNESS"), Some(100.0));
        assert!((sample.value("LOAD").unwrap() - 0.981).abs() < 1e-12);
        assert_eq!(sample.unit("LOAD"), Some("kPa"));
    }

    #[test]
    fn test_conversion_skips_missing_source() {
        let provider = ConversionIntensityProvider::new(
            Fixed(IntensitySample::new()),
            "THICKNESS",
            "LOAD",
            |v, _| (v, "kPa".to_string()),
        );
        assert!(!provider.nearest(0.0, 0.0).contains("LOAD"));
    }
}
