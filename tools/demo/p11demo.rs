// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use p11client::config::Config;
use p11client::encryption::*;
use p11client::keys::*;
use p11client::log::{level_from_str, log_init, log_init_to};
use p11client::mechanism::{OaepHash, OaepParams};
use p11client::pkcs11::{CK_SLOT_ID, CK_ULONG};
use p11client::signature::{ecdsa_sign, ecdsa_verify, Verification};
use p11client::slot::enumerate;
use p11client::{Error, Provider, Result, TokenSession};

const AES_TEXT: &str = "This is to test our AES encryption scheme \
    implementation and we are adding some texts on line #2";
const RSA_TEXT: &str = "This is to test our RSA-OAEO encryption scheme \
    implementation.";
const ECDSA_DATA: &str = "This data is for testing only";

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Arguments {
    /// Cryptoki module to load, overrides the configuration
    #[arg(short = 'm', long)]
    pkcs11_module: Option<String>,

    #[arg(short = 's', long)]
    slot: Option<CK_SLOT_ID>,

    /// User PIN
    #[arg(short = 'p', long)]
    pin: Option<String>,

    /// Configuration file
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Log debug messages to standard output
    #[arg(short = 'd', long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum HashArg {
    Sha1,
    Sha256,
}

impl From<HashArg> for OaepHash {
    fn from(h: HashArg) -> OaepHash {
        match h {
            HashArg::Sha1 => OaepHash::Sha1,
            HashArg::Sha256 => OaepHash::Sha256,
        }
    }
}

fn parse_aes_size(s: &str) -> std::result::Result<AesKeyLength, String> {
    match s {
        "128" => Ok(AesKeyLength::Aes128),
        "192" => Ok(AesKeyLength::Aes192),
        "256" => Ok(AesKeyLength::Aes256),
        _ => Err(format!("{} is not one of 128, 192, 256", s)),
    }
}

fn parse_rsa_bits(s: &str) -> std::result::Result<CK_ULONG, String> {
    match s {
        "2048" | "3072" | "4096" => {
            s.parse::<CK_ULONG>().map_err(|e| e.to_string())
        }
        _ => Err(format!("{} is not one of 2048, 3072, 4096", s)),
    }
}

fn parse_curve(s: &str) -> std::result::Result<EcCurve, String> {
    s.parse::<EcCurve>().map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Show the module information
    Info,
    /// List slots and their tokens
    Slots {
        /// Include slots without a token
        #[arg(long)]
        all: bool,
    },
    /// Generate an AES key
    AesKeygen {
        #[arg(long, default_value = "128", value_parser = parse_aes_size)]
        size: AesKeyLength,
    },
    /// Generate an AES key and run AES-CBC-PAD over a text
    Aes {
        #[arg(long, default_value = "128", value_parser = parse_aes_size)]
        size: AesKeyLength,
        #[arg(long, default_value = AES_TEXT)]
        plaintext: String,
    },
    /// Generate an RSA key pair
    RsaKeygen {
        #[arg(long, default_value = "2048", value_parser = parse_rsa_bits)]
        bits: CK_ULONG,
        /// Public exponent in hex
        #[arg(long)]
        exponent: Option<String>,
    },
    /// Generate an RSA key pair and run RSA-OAEP over a text
    Rsa {
        #[arg(long, default_value = "2048", value_parser = parse_rsa_bits)]
        bits: CK_ULONG,
        #[arg(long, value_enum, default_value_t = HashArg::Sha1)]
        hash: HashArg,
        #[arg(long, default_value = RSA_TEXT)]
        plaintext: String,
    },
    /// Generate an EC key pair
    EcKeygen {
        #[arg(long, default_value = "prime256v1", value_parser = parse_curve)]
        curve: EcCurve,
    },
    /// Generate an ECDSA key pair, sign and verify some data
    Ecdsa {
        #[arg(long, default_value = "secp521r1", value_parser = parse_curve)]
        curve: EcCurve,
        #[arg(long, default_value = ECDSA_DATA)]
        data: String,
    },
}

struct Context {
    config: Config,
    provider: Provider,
    slot: Option<CK_SLOT_ID>,
    pin: Option<String>,
}

impl Context {
    fn new(args: &Arguments) -> Result<Context> {
        let config = match &args.config {
            Some(filename) => Config::from_file(filename)?,
            None => Config::default_config()?,
        };
        let provider = match &args.pkcs11_module {
            Some(path) => Provider::load(path)?,
            None => Provider::from_config(&config)?,
        };
        Ok(Context {
            slot: args.slot.or(config.slot),
            pin: args.pin.clone().or(config.pin.clone()),
            config: config,
            provider: provider,
        })
    }

    fn initialized(&self) -> Result<TokenSession<'_>> {
        let mut session = TokenSession::new(&self.provider);
        session.initialize()?;
        Ok(session)
    }

    fn connected(&self) -> Result<TokenSession<'_>> {
        let slot = match self.slot {
            Some(s) => s,
            None => self.config.slot()?,
        };
        let pin = match &self.pin {
            Some(p) => p,
            None => {
                return Err(Error::config(
                    "no PIN given, use --pin or the pin option".to_string(),
                ))
            }
        };
        let mut session = TokenSession::new(&self.provider);
        session.connect(slot, pin)?;
        println!("Logged in to slot {}", slot);
        Ok(session)
    }
}

fn check_roundtrip(expected: &[u8], got: &[u8]) -> Result<()> {
    if expected != got {
        return Err(Error::other_error("decrypted text does not match"));
    }
    println!("Decrypted text: {}", String::from_utf8_lossy(got));
    Ok(())
}

fn corrupt_signature(sig: &mut [u8]) -> Result<()> {
    match sig.first_mut() {
        Some(b) => {
            *b ^= 0xff;
            Ok(())
        }
        None => Err(Error::other_error("empty signature")),
    }
}

fn expect_rejected(ret: Verification) -> Result<()> {
    match ret {
        Verification::Invalid => Ok(()),
        Verification::Valid => Err(Error::other_error(
            "corrupted signature was not rejected",
        )),
    }
}

fn run(args: &Arguments) -> Result<()> {
    let ctx = Context::new(args)?;

    let mut session = match &args.command {
        Commands::Info => {
            let session = ctx.initialized()?;
            println!("{}", ctx.provider.info()?);
            session
        }
        Commands::Slots { all } => {
            let session = ctx.initialized()?;
            let present = !*all && ctx.config.token_present;
            for desc in enumerate(&session, present)? {
                println!("{}", desc);
            }
            session
        }
        Commands::AesKeygen { size } => {
            let session = ctx.connected()?;
            let opts = KeyOptions::new(&size.default_label());
            let key = generate_aes_key(&session, *size, &opts)?;
            println!("Generated \"{}\" with handle {}", opts.label, key);
            session
        }
        Commands::Aes { size, plaintext } => {
            let session = ctx.connected()?;
            let opts = KeyOptions::new(&size.default_label());
            let key = generate_aes_key(&session, *size, &opts)?;
            println!("Generated \"{}\" with handle {}", opts.label, key);
            let ct = aes_cbc_encrypt(&session, key, plaintext.as_bytes())?;
            println!("IV:         {}", hex::encode(ct.iv));
            println!("Ciphertext: {}", hex::encode(&ct.data));
            let pt = aes_cbc_decrypt(&session, key, &ct)?;
            check_roundtrip(plaintext.as_bytes(), &pt)?;
            session
        }
        Commands::RsaKeygen { bits, exponent } => {
            let session = ctx.connected()?;
            let mut spec = RsaKeySpec::new(*bits);
            if let Some(e) = exponent {
                let exponent = hex::decode(e).map_err(Error::other_error)?;
                spec = spec.with_exponent(exponent);
            }
            let opts = KeyOptions::new(&format!("RSA {}-bit key", bits));
            let pair = generate_rsa_key_pair(&session, &spec, &opts)?;
            println!(
                "Generated \"{}\" with public key {} and private key {}",
                opts.label, pair.public, pair.private
            );
            session
        }
        Commands::Rsa {
            bits,
            hash,
            plaintext,
        } => {
            let session = ctx.connected()?;
            let spec = RsaKeySpec::new(*bits);
            let opts = KeyOptions::new(&format!("RSA {}-bit key", bits));
            let pair = generate_rsa_key_pair(&session, &spec, &opts)?;
            let params = OaepParams::new(OaepHash::from(*hash));
            let max = params.max_message_len(spec.modulus_bytes());
            if plaintext.len() > max {
                println!(
                    "Plaintext is {} bytes, at most {} fit with {}",
                    plaintext.len(),
                    max,
                    params.hash.name()
                );
            }
            let ct = rsa_oaep_encrypt(
                &session,
                pair.public,
                &params,
                plaintext.as_bytes(),
            )?;
            println!("Ciphertext: {}", hex::encode(&ct));
            let pt = rsa_oaep_decrypt(&session, pair.private, &params, &ct)?;
            check_roundtrip(plaintext.as_bytes(), &pt)?;
            session
        }
        Commands::EcKeygen { curve } => {
            let session = ctx.connected()?;
            let opts = KeyOptions::new(&format!("EC {} key", curve));
            let pair = generate_ec_key_pair(&session, curve.oid_der(), &opts)?;
            println!(
                "Generated \"{}\" with public key {} and private key {}",
                opts.label, pair.public, pair.private
            );
            session
        }
        Commands::Ecdsa { curve, data } => {
            let session = ctx.connected()?;
            let opts = KeyOptions::new(&format!("ECDSA {} key", curve));
            let pair =
                generate_ecdsa_key_pair(&session, curve.oid_der(), &opts)?;
            let mut sig = ecdsa_sign(&session, pair.private, data.as_bytes())?;
            println!("Signature ({} bytes): {}", sig.len(), hex::encode(&sig));
            let ret =
                ecdsa_verify(&session, pair.public, data.as_bytes(), &sig)?;
            println!("Verification: {:?}", ret);
            if !ret.is_valid() {
                return Err(Error::other_error("signature did not verify"));
            }
            corrupt_signature(&mut sig)?;
            let ret =
                ecdsa_verify(&session, pair.public, data.as_bytes(), &sig)?;
            println!("Verification of a corrupted signature: {:?}", ret);
            expect_rejected(ret)?;
            session
        }
    };
    session.disconnect()
}

fn main() -> ExitCode {
    let args = Arguments::parse();
    if args.debug {
        log_init_to("stdout", level_from_str(Some("debug")));
    } else {
        log_init();
    }

    match run(&args) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}
