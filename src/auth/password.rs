use bcrypt::{hash, verify};
use unicode_general_category::{GeneralCategory, get_general_category};

/// Coût bcrypt par défaut : volontairement lent.
pub const DEFAULT_BCRYPT_COST: u32 = 12;
/// Bornes acceptées par bcrypt.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Règle de complexité non respectée. Les règles sont évaluées dans
/// l'ordre des variantes et la première qui échoue est retournée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("password must be at least 8 characters")]
    TooShort,
    #[error("password must contain at least one uppercase letter")]
    NoUppercase,
    #[error("password must contain at least one lowercase letter")]
    NoLowercase,
    #[error("password must contain at least one digit")]
    NoDigit,
    #[error("password must contain at least one special character")]
    NoSpecial,
}

impl PasswordPolicyError {
    pub fn code(self) -> &'static str {
        match self {
            Self::TooShort => "PASSWORD_TOO_SHORT",
            Self::NoUppercase => "PASSWORD_NO_UPPERCASE",
            Self::NoLowercase => "PASSWORD_NO_LOWERCASE",
            Self::NoDigit => "PASSWORD_NO_DIGIT",
            Self::NoSpecial => "PASSWORD_NO_SPECIAL",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordManager {
    cost: u32,
}

impl Default for PasswordManager {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordManager {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash(password, self.cost).map_err(PasswordError::HashingFailed)
    }

    /// Never fails: a malformed hash is treated as a mismatch.
    pub fn verify(password: &str, hash: &str) -> bool {
        verify(password, hash).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Stored password hash could not be verified");
            false
        })
    }

    pub fn validate(password: &str) -> Result<(), PasswordPolicyError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort);
        }

        let (mut upper, mut lower, mut digit, mut special) = (false, false, false, false);
        for c in password.chars() {
            match CharClass::of(c) {
                Some(CharClass::Upper) => upper = true,
                Some(CharClass::Lower) => lower = true,
                Some(CharClass::Digit) => digit = true,
                Some(CharClass::Special) => special = true,
                None => {}
            }
        }

        if !upper {
            return Err(PasswordPolicyError::NoUppercase);
        }
        if !lower {
            return Err(PasswordPolicyError::NoLowercase);
        }
        if !digit {
            return Err(PasswordPolicyError::NoDigit);
        }
        if !special {
            return Err(PasswordPolicyError::NoSpecial);
        }
        Ok(())
    }
}

/// Classe d'un caractère selon sa catégorie Unicode générale.
/// Tout ce qui n'est ni lettre casée, ni chiffre décimal, ni ponctuation,
/// ni symbole ne compte pour aucune règle (U+200B, U+0301, ½).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Upper,
    Lower,
    Digit,
    Special,
}

impl CharClass {
    fn of(c: char) -> Option<Self> {
        use GeneralCategory as G;

        match get_general_category(c) {
            G::UppercaseLetter => Some(Self::Upper),
            G::LowercaseLetter => Some(Self::Lower),
            G::DecimalNumber => Some(Self::Digit),
            G::ConnectorPunctuation
            | G::DashPunctuation
            | G::OpenPunctuation
            | G::ClosePunctuation
            | G::InitialPunctuation
            | G::FinalPunctuation
            | G::OtherPunctuation
            | G::MathSymbol
            | G::CurrencySymbol
            | G::ModifierSymbol
            | G::OtherSymbol => Some(Self::Special),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_BCRYPT_COST, MIN_BCRYPT_COST, PasswordManager, PasswordPolicyError};

    fn fast() -> PasswordManager {
        PasswordManager::new(MIN_BCRYPT_COST)
    }

    #[test]
    fn verify_returns_true_when_password_matches() {
        let password = "Secure_password_@123";
        let hashed = fast().hash(password).expect("Hashing failed");

        assert!(PasswordManager::verify(password, &hashed));
    }

    #[test]
    fn verify_returns_false_when_password_does_not_match() {
        let hashed = fast().hash("Secure_password_@123").expect("Hashing failed");

        assert!(!PasswordManager::verify("WrongPass!1", &hashed));
    }

    #[test]
    fn hashing_is_salted() {
        let pm = fast();
        let hash1 = pm.hash("Str0ng!Pass").unwrap();
        let hash2 = pm.hash("Str0ng!Pass").unwrap();

        assert_ne!(hash1, hash2);
        assert!(PasswordManager::verify("Str0ng!Pass", &hash1));
        assert!(PasswordManager::verify("Str0ng!Pass", &hash2));
    }

    #[test]
    fn verify_treats_garbage_hash_as_mismatch() {
        assert!(!PasswordManager::verify("Str0ng!Pass", "not-a-bcrypt-hash"));
    }

    #[test]
    fn default_cost_is_deliberately_slow() {
        assert_eq!(PasswordManager::default().cost, 12);
    }

    #[test]
    fn validate_accepts_password_with_every_class() {
        assert_eq!(PasswordManager::validate("Str0ng!Pass"), Ok(()));
    }

    #[test]
    fn validate_reports_the_single_missing_class() {
        let cases = [
            ("Sh0rt!", PasswordPolicyError::TooShort),
            ("lowercase1!", PasswordPolicyError::NoUppercase),
            ("UPPERCASE1!", PasswordPolicyError::NoLowercase),
            ("NoDigitsHere!", PasswordPolicyError::NoDigit),
            ("NoSpecial123", PasswordPolicyError::NoSpecial),
        ];

        for (password, expected) in cases {
            assert_eq!(
                PasswordManager::validate(password),
                Err(expected),
                "password {password:?}"
            );
        }
    }

    #[test]
    fn validate_checks_length_before_classes() {
        assert_eq!(
            PasswordManager::validate("abc"),
            Err(PasswordPolicyError::TooShort)
        );
    }

    #[test]
    fn validate_accepts_non_ascii_symbols() {
        assert_eq!(PasswordManager::validate("Passw0rd€"), Ok(()));
    }

    #[test]
    fn cost_bounds_match_what_bcrypt_accepts() {
        assert!(PasswordManager::new(MIN_BCRYPT_COST - 1).hash("x").is_err());
        assert!(PasswordManager::new(MAX_BCRYPT_COST + 1).hash("x").is_err());
        assert!(PasswordManager::new(MIN_BCRYPT_COST).hash("x").is_ok());
    }

    #[test]
    fn invisible_characters_are_not_special() {
        // espace de largeur nulle (Cf) puis accent combinant (Mn)
        for password in ["Passw0rd\u{200B}", "Passw0rde\u{301}"] {
            assert_eq!(
                PasswordManager::validate(password),
                Err(PasswordPolicyError::NoSpecial),
                "password {password:?}"
            );
        }
    }

    #[test]
    fn only_decimal_digits_count_as_digits() {
        assert_eq!(
            PasswordManager::validate("Password½!"),
            Err(PasswordPolicyError::NoDigit)
        );
        assert_eq!(
            PasswordManager::validate("Password²!"),
            Err(PasswordPolicyError::NoDigit)
        );
        assert_eq!(PasswordManager::validate("Passw\u{0664}rd!"), Ok(()));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 7 caractères, 8 octets
        assert_eq!(
            PasswordManager::validate("Pé0rd!x"),
            Err(PasswordPolicyError::TooShort)
        );
    }
}
